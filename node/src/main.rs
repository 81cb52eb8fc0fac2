use agrocast_core::{
    evaluate_segment, PredictionQuery, Predictor, SegmentModelStore, TrainStatus,
    DEFAULT_TEST_FRACTION,
};
use agrocast_dataset::{synthesize, write_csv, CsvPriceSource, SynthConfig};
use agrocast_forest::{ForestConfig, ForestModel};
use agrocast_rpc::{start_server, AppState};
use agrocast_storage::{ArtifactStore, FileArtifactStore};
use agrocast_types::{title_case, SegmentKey, SupportedCatalog, FEATURE_NAMES};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::{Config, ConfigError, File as ConfigFile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod version;

use version::{git_commit_hash, AGROCAST_VERSION};

const DEFAULT_CONFIG_PATH: &str = "config/agrocast.toml";
const DEFAULT_DATA_FILE: &str = "all_crop_data.csv";
const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_RPC_HOST: &str = "0.0.0.0";
const DEFAULT_RPC_PORT: u16 = 5000;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
struct AppConfig {
    config_path: Option<PathBuf>,

    // Data
    data_file: PathBuf,
    model_dir: PathBuf,

    // HTTP
    rpc_host: String,
    rpc_port: u16,
    static_dir: Option<PathBuf>,

    // Model training
    forest: ForestConfig,
    catalog: SupportedCatalog,

    // Logging
    log_level: String,
    log_format: String,
}

impl AppConfig {
    fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                Some(path)
            } else {
                None
            }
        };

        let mut builder = Config::builder();

        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }

        builder = builder.add_source(config::Environment::with_prefix("AGROCAST"));

        let config = builder.build()?;

        let rpc_port = match get_parsed_value::<u16>(&config, &["rpc_port", "rpc.port"])? {
            Some(port) => port,
            None => match std::env::var("PORT") {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("PORT must be a valid port number, got {raw:?}"))?,
                Err(_) => DEFAULT_RPC_PORT,
            },
        };

        let defaults = ForestConfig::default();
        let forest = ForestConfig {
            n_estimators: get_parsed_value(&config, &["n_estimators", "forest.n_estimators"])?
                .unwrap_or(defaults.n_estimators),
            seed: get_parsed_value(&config, &["seed", "forest.seed"])?.unwrap_or(defaults.seed),
            max_depth: get_parsed_value(&config, &["max_depth", "forest.max_depth"])?
                .or(defaults.max_depth),
            min_samples_split: get_parsed_value(
                &config,
                &["min_samples_split", "forest.min_samples_split"],
            )?
            .unwrap_or(defaults.min_samples_split),
            min_samples_leaf: get_parsed_value(
                &config,
                &["min_samples_leaf", "forest.min_samples_leaf"],
            )?
            .unwrap_or(defaults.min_samples_leaf),
            bootstrap: defaults.bootstrap,
        };

        Ok(Self {
            config_path: resolved_path,
            data_file: get_string_value(&config, &["data_file", "data.file"])
                .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string())
                .into(),
            model_dir: get_string_value(&config, &["model_dir", "models.dir"])
                .unwrap_or_else(|| DEFAULT_MODEL_DIR.to_string())
                .into(),
            rpc_host: get_string_value(&config, &["rpc_host", "rpc.host"])
                .unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            rpc_port,
            static_dir: get_string_value(&config, &["static_dir", "rpc.static_dir"])
                .map(PathBuf::from),
            forest,
            catalog: load_catalog(&config)?,
            log_level: get_string_value(&config, &["log_level", "logging.level"])
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(&config, &["log_format", "logging.format"])
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.data_file.as_os_str().is_empty() {
            anyhow::bail!("DATA_FILE must not be empty");
        }
        if self.model_dir.as_os_str().is_empty() {
            anyhow::bail!("MODEL_DIR must not be empty");
        }
        if self.rpc_port == 0 {
            anyhow::bail!("RPC_PORT must be greater than zero");
        }
        self.forest
            .validate()
            .context("invalid forest configuration")?;
        if self.catalog.is_empty() {
            anyhow::bail!("catalog must list at least one crop with one state");
        }
        Ok(())
    }

    fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_parsed_value<T>(config: &Config, keys: &[&str]) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    for &key in keys {
        if let Some(raw) = get_string_value(config, &[key]) {
            return raw
                .parse::<T>()
                .map(Some)
                .map_err(|err| anyhow!("invalid value {raw:?} for {key}: {err}"));
        }
    }
    Ok(None)
}

/// Reads the `[catalog]` table. Crop and state names are title-cased so the
/// table matches normalized request keys regardless of how it was written.
fn load_catalog(config: &Config) -> Result<SupportedCatalog> {
    let table = match config.get::<BTreeMap<String, Vec<String>>>("catalog") {
        Ok(table) => table,
        Err(ConfigError::NotFound(_)) => return Ok(SupportedCatalog::default()),
        Err(err) => return Err(err).context("invalid [catalog] table"),
    };

    let crops = table
        .into_iter()
        .map(|(crop, states)| {
            let states = states
                .iter()
                .map(|state| title_case(state.trim()))
                .filter(|state| !state.is_empty())
                .collect::<Vec<_>>();
            (title_case(crop.trim()), states)
        })
        .filter(|(crop, states)| !crop.is_empty() && !states.is_empty())
        .collect();

    Ok(SupportedCatalog::new(crops))
}

fn load_config_with_overrides(matches: &ArgMatches, sub_matches: &ArgMatches) -> Result<AppConfig> {
    let config_path = sub_matches
        .get_one::<String>("config")
        .or_else(|| matches.get_one::<String>("config"))
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    apply_overrides(sub_matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &ArgMatches, config: &mut AppConfig) {
    if let Some(data_file) = matches.get_one::<String>("data-file") {
        config.data_file = PathBuf::from(data_file);
    }

    if let Some(model_dir) = matches.get_one::<String>("model-dir") {
        config.model_dir = PathBuf::from(model_dir);
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    if let Some(rpc_host) = matches.get_one::<String>("rpc-host") {
        config.rpc_host = rpc_host.clone();
    }

    if let Some(rpc_port) = matches.get_one::<u16>("rpc-port") {
        config.rpc_port = *rpc_port;
    }

    if let Some(static_dir) = matches.get_one::<String>("static-dir") {
        config.static_dir = Some(PathBuf::from(static_dir));
    }
}

fn segment_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("crop")
                .long("crop")
                .value_name("CROP")
                .help("Crop name, e.g. Wheat"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .value_name("STATE")
                .help("State name, e.g. \"Uttar Pradesh\""),
        )
}

fn cli() -> Command {
    Command::new("agrocast")
        .version(AGROCAST_VERSION)
        .about("Per-segment crop price prediction service")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (defaults to config/agrocast.toml if present)")
                .global(true),
        )
        .arg(
            Arg::new("data-file")
                .long("data-file")
                .value_name("FILE")
                .help("Canonical price dataset (CSV)")
                .global(true),
        )
        .arg(
            Arg::new("model-dir")
                .long("model-dir")
                .value_name("DIR")
                .help("Directory holding trained model artifacts")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .arg(
            Arg::new("rpc-host")
                .long("rpc-host")
                .value_name("HOST")
                .help("Override the HTTP bind host")
                .global(true),
        )
        .arg(
            Arg::new("rpc-port")
                .long("rpc-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Override the HTTP port")
                .global(true),
        )
        .arg(
            Arg::new("static-dir")
                .long("static-dir")
                .value_name("DIR")
                .help("Serve web UI assets from this directory")
                .global(true),
        )
        .subcommand(Command::new("serve").about("Start the HTTP API"))
        .subcommand(
            segment_args(Command::new("predict").about("Predict the price for one date"))
                .mut_arg("crop", |arg| arg.required(true))
                .mut_arg("state", |arg| arg.required(true))
                .arg(
                    Arg::new("date")
                        .long("date")
                        .value_name("YYYY-MM-DD")
                        .required(true)
                        .help("Date to predict for"),
                )
                .arg(
                    Arg::new("rainfall")
                        .long("rainfall")
                        .value_name("MM")
                        .value_parser(value_parser!(f64))
                        .default_value("0")
                        .help("Expected rainfall"),
                )
                .arg(
                    Arg::new("demand")
                        .long("demand")
                        .value_name("UNITS")
                        .value_parser(value_parser!(f64))
                        .default_value("0")
                        .help("Expected demand"),
                ),
        )
        .subcommand(
            segment_args(
                Command::new("train")
                    .about("Train one segment, or every catalog segment when none is given"),
            )
            .mut_arg("crop", |arg| arg.requires("state"))
            .mut_arg("state", |arg| arg.requires("crop"))
            .arg(
                Arg::new("force")
                    .long("force")
                    .action(ArgAction::SetTrue)
                    .help("Retrain even when an artifact already exists"),
            ),
        )
        .subcommand(
            segment_args(Command::new("evaluate").about("Hold-out evaluation of one segment"))
                .mut_arg("crop", |arg| arg.required(true))
                .mut_arg("state", |arg| arg.required(true))
                .arg(
                    Arg::new("test-fraction")
                        .long("test-fraction")
                        .value_name("FRACTION")
                        .value_parser(value_parser!(f64))
                        .help("Share of rows held out for testing (default 0.2)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("synth")
                .about("Write a placeholder dataset for every catalog segment")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output CSV (defaults to the configured data file)"),
                )
                .arg(
                    Arg::new("days")
                        .long("days")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .help("Days of history per segment (default 1000)"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_name("SEED")
                        .value_parser(value_parser!(u64))
                        .help("RNG seed (default 42)"),
                )
                .arg(
                    Arg::new("start")
                        .long("start")
                        .value_name("YYYY-MM-DD")
                        .help("First date (default 2023-01-01)"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite an existing file"),
                ),
        )
        .subcommand(Command::new("clean").about("Delete every trained model artifact"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let Some((command, sub_matches)) = matches.subcommand() else {
        anyhow::bail!("no command given");
    };

    let config = load_config_with_overrides(&matches, sub_matches)?;

    init_logging(&config)?;
    debug!(
        "Agrocast {} (commit {}) loaded config from {:?}",
        AGROCAST_VERSION,
        git_commit_hash(),
        config.config_path
    );

    match command {
        "serve" => serve(config).await,
        other => {
            let command = other.to_string();
            let sub_matches = sub_matches.clone();
            tokio::task::spawn_blocking(move || run_offline(&command, &config, &sub_matches))
                .await
                .context("command task failed")?
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let source = require_dataset(&config)?;
    info!("Data file found: {}", source.path().display());
    info!("Models will be trained on first prediction request");

    let predictor = Arc::new(build_predictor(&config, source)?);
    let state = AppState::new(predictor, config.catalog.clone())
        .with_static_dir(config.static_dir.clone());

    info!(
        "Starting Agrocast {} (commit {}) with {} crops",
        AGROCAST_VERSION,
        git_commit_hash(),
        config.catalog.crops().count()
    );

    let addr = config.rpc_addr();
    tokio::select! {
        result = start_server(state, &addr) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

fn run_offline(command: &str, config: &AppConfig, matches: &ArgMatches) -> Result<()> {
    match command {
        "predict" => run_predict(config, matches),
        "train" => run_train(config, matches),
        "evaluate" => run_evaluate(config, matches),
        "synth" => run_synth(config, matches),
        "clean" => run_clean(config),
        other => Err(anyhow!("unknown command {other}")),
    }
}

fn require_dataset(config: &AppConfig) -> Result<CsvPriceSource> {
    let source = CsvPriceSource::new(&config.data_file);
    if !source.exists() {
        anyhow::bail!(
            "Data file {} not found; run `agrocast synth` to generate placeholder data",
            config.data_file.display()
        );
    }
    Ok(source)
}

fn build_store(config: &AppConfig, source: CsvPriceSource) -> Result<SegmentModelStore> {
    let artifacts = FileArtifactStore::open(&config.model_dir).with_context(|| {
        format!(
            "failed to open model directory {}",
            config.model_dir.display()
        )
    })?;
    Ok(SegmentModelStore::new(
        Arc::new(source),
        Arc::new(artifacts),
        config.forest.clone(),
    ))
}

fn build_predictor(config: &AppConfig, source: CsvPriceSource) -> Result<Predictor> {
    let store = build_store(config, source)?;
    Ok(Predictor::new(Arc::new(store)).with_catalog(config.catalog.clone()))
}

/// Normalized (crop, state) from `--crop`/`--state`, if both were given.
fn segment_from_args(matches: &ArgMatches) -> Option<SegmentKey> {
    let crop = matches.get_one::<String>("crop")?;
    let state = matches.get_one::<String>("state")?;
    Some(SegmentKey::normalized(crop, state))
}

fn required_segment(matches: &ArgMatches) -> Result<SegmentKey> {
    segment_from_args(matches).ok_or_else(|| anyhow!("--crop and --state are required"))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| anyhow!("Invalid date format. Use YYYY-MM-DD"))
}

fn run_predict(config: &AppConfig, matches: &ArgMatches) -> Result<()> {
    let key = required_segment(matches)?;
    config.catalog.check(&key)?;
    let date = parse_date(
        matches
            .get_one::<String>("date")
            .ok_or_else(|| anyhow!("--date is required"))?,
    )?;
    let rainfall = matches.get_one::<f64>("rainfall").copied().unwrap_or(0.0);
    let demand = matches.get_one::<f64>("demand").copied().unwrap_or(0.0);

    let predictor = build_predictor(config, require_dataset(config)?)?;
    let price = predictor.predict(&PredictionQuery {
        key: key.clone(),
        date,
        rainfall,
        demand,
    })?;

    println!(
        "Predicted price for {} on {}: {:.2}",
        key,
        date.format(DATE_FORMAT),
        price
    );
    Ok(())
}

fn run_train(config: &AppConfig, matches: &ArgMatches) -> Result<()> {
    let force = matches.get_flag("force");
    let store = build_store(config, require_dataset(config)?)?;

    if let Some(key) = segment_from_args(matches) {
        config.catalog.check(&key)?;
        let trained = if force {
            store.retrain(&key)
        } else {
            store.get_or_train(&key)
        };
        let model = trained.with_context(|| format!("Could not load/train model for {key}"))?;
        println!("{}", describe_model(&key, &model));
        return Ok(());
    }

    let outcomes = store.train_catalog(&config.catalog, force);
    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.status {
            TrainStatus::Trained => println!("trained  {}", outcome.key),
            TrainStatus::Skipped => println!("present  {}", outcome.key),
            TrainStatus::Failed(err) => {
                failed += 1;
                println!("failed   {}: {}", outcome.key, err);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} segments failed to train", outcomes.len());
    }
    info!("All {} segments have a model", outcomes.len());
    Ok(())
}

/// One-line summary of a fitted segment model.
fn describe_model(key: &SegmentKey, model: &ForestModel) -> String {
    let max_depth = model.trees.iter().map(|tree| tree.depth()).max().unwrap_or(0);
    let leaves: usize = model.trees.iter().map(|tree| tree.leaf_count()).sum();
    format!(
        "{}: {} trees (max depth {}, {} leaves) over {} rows using [{}] (hash {})",
        key,
        model.num_trees(),
        max_depth,
        leaves,
        model.metadata.training_rows,
        FEATURE_NAMES.join(", "),
        model.metadata.model_hash
    )
}

fn run_evaluate(config: &AppConfig, matches: &ArgMatches) -> Result<()> {
    let key = required_segment(matches)?;
    let test_fraction = matches
        .get_one::<f64>("test-fraction")
        .copied()
        .unwrap_or(DEFAULT_TEST_FRACTION);
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        anyhow::bail!("--test-fraction must be between 0 and 1, got {test_fraction}");
    }

    let source = require_dataset(config)?;
    let report = evaluate_segment(&source, &key, &config.forest, test_fraction)
        .with_context(|| format!("evaluation failed for {key}"))?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Evaluation for {}", report.key);
    println!(
        "  training rows: {}, test rows: {}",
        report.train_rows, report.test_rows
    );
    println!("  {:<12} {:>12} {:>12}", "date", "actual", "predicted");
    for row in &report.rows {
        println!(
            "  {:<12} {:>12.2} {:>12.2}",
            row.date.format(DATE_FORMAT),
            row.actual,
            row.predicted
        );
    }
    println!("  mean absolute error: {:.2}", report.mean_absolute_error);
    println!("  R-squared: {:.4}", report.r2);
    Ok(())
}

fn run_synth(config: &AppConfig, matches: &ArgMatches) -> Result<()> {
    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.data_file.clone());
    if output.exists() && !matches.get_flag("force") {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            output.display()
        );
    }

    let defaults = SynthConfig::default();
    let synth = SynthConfig {
        start: match matches.get_one::<String>("start") {
            Some(value) => parse_date(value)?,
            None => defaults.start,
        },
        days: matches.get_one::<usize>("days").copied().unwrap_or(defaults.days),
        seed: matches.get_one::<u64>("seed").copied().unwrap_or(defaults.seed),
    };

    let records = synthesize(&config.catalog, &synth);
    write_csv(&output, &records)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Wrote {} rows for {} segments to {}",
        records.len(),
        config.catalog.segments().len(),
        output.display()
    );
    Ok(())
}

fn run_clean(config: &AppConfig) -> Result<()> {
    if !config.model_dir.exists() {
        warn!(
            "Model directory {} does not exist, nothing to clean",
            config.model_dir.display()
        );
        return Ok(());
    }
    let store = FileArtifactStore::open(&config.model_dir)?;
    let removed = store.purge()?;
    println!(
        "Removed {} model artifacts from {}",
        removed,
        display_dir(store.dir())
    );
    Ok(())
}

fn display_dir(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
