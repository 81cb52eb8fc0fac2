pub mod catalog;
pub mod features;
pub mod health;
pub mod record;
pub mod segment;

pub use catalog::*;
pub use features::*;
pub use health::*;
pub use record::*;
pub use segment::*;

#[cfg(test)]
mod tests;
