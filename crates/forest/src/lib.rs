//! Agrocast Forest - deterministic random-forest regression
//!
//! Bagged CART regression trees with per-tree seeding, so a given seed and
//! training set always produce the same forest regardless of how many
//! threads grow it.

pub mod cart;
pub mod data;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod trainer;
pub mod tree;

pub use cart::{CartBuilder, TreeConfig};
pub use data::{train_test_split, TrainingSet};
pub use errors::ForestError;
pub use metrics::{mean_absolute_error, r2_score};
pub use model::{ForestMetadata, ForestModel, MODEL_VERSION};
pub use trainer::{tree_seed, ForestConfig, ForestTrainer};
pub use tree::{Node, RegressionTree};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
