//! ICU Vitals CLI
//!
//! Ingestion, feature export, windowing and risk scoring for ICU vitals.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use icu_vitals::{
    audit::RunLog,
    config::Config,
    core::{
        assess_all, extract_all, group_by_stay, windowing, windows_all, FeatureProfile,
        LabelAlignment, ReportBuilder,
    },
    ingest::{load_table, write_table, ImputationStrategy, LoadedTable},
    model::{LastValueForecaster, SequencePredictor, WindowMeanForecaster},
    orchestrator::Orchestrator,
    ReportEnvelope, StayId, CLINICAL_DISCLAIMER, VERSION,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "icu-vitals")]
#[command(version = VERSION)]
#[command(about = "ICU vital-sign ingestion, features and risk scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline and write every export
    Process {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory (defaults to the configured export path)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Feature profile (basic or extended)
        #[arg(long)]
        profile: Option<FeatureProfile>,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Export one feature vector per stay as CSV
    Features {
        #[command(flatten)]
        input: InputArgs,

        /// Output CSV file
        #[arg(long, short)]
        output: PathBuf,

        /// Feature profile (basic or extended)
        #[arg(long)]
        profile: Option<FeatureProfile>,
    },

    /// Score every stay with the rule-based scorer
    Score {
        #[command(flatten)]
        input: InputArgs,

        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Export labeled training windows as JSON lines
    Windows {
        #[command(flatten)]
        input: InputArgs,

        /// Output JSONL file
        #[arg(long, short)]
        output: PathBuf,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Forecast one stay and report escalation and severity
    Predict {
        #[command(flatten)]
        input: InputArgs,

        /// Patient stay id
        #[arg(long)]
        stay_id: String,

        /// Reference forecaster to use
        #[arg(long, value_enum, default_value = "last-value")]
        forecaster: ForecasterArg,

        /// Records per inference window
        #[arg(long)]
        window_size: Option<usize>,
    },

    /// Show cumulative run statistics
    Stats,

    /// Show configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Source directory or CSV file (defaults to the configured input path)
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Ingestion fill strategy
    #[arg(long, value_enum)]
    imputation: Option<ImputationArg>,
}

#[derive(Args)]
struct WindowArgs {
    /// Records per window
    #[arg(long)]
    window_size: Option<usize>,

    /// Which record labels a training window
    #[arg(long, value_enum)]
    alignment: Option<AlignmentArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImputationArg {
    CarryThenMedian,
    MedianOnly,
}

impl From<ImputationArg> for ImputationStrategy {
    fn from(arg: ImputationArg) -> Self {
        match arg {
            ImputationArg::CarryThenMedian => ImputationStrategy::CarryThenMedian,
            ImputationArg::MedianOnly => ImputationStrategy::MedianOnly,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AlignmentArg {
    LastInWindow,
    NextRecord,
}

impl From<AlignmentArg> for LabelAlignment {
    fn from(arg: AlignmentArg) -> Self {
        match arg {
            AlignmentArg::LastInWindow => LabelAlignment::LastInWindow,
            AlignmentArg::NextRecord => LabelAlignment::NextRecord,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ForecasterArg {
    LastValue,
    WindowMean,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let mut config = Config::load().context("could not load configuration")?;

    match command {
        Commands::Process {
            input,
            output,
            profile,
            window,
        } => {
            input.apply(&mut config);
            window.apply(&mut config);
            if let Some(profile) = profile {
                config.feature_profile = profile;
            }
            if let Some(output) = output {
                config.export_path = output;
            }
            cmd_process(&config)
        }
        Commands::Features {
            input,
            output,
            profile,
        } => {
            input.apply(&mut config);
            if let Some(profile) = profile {
                config.feature_profile = profile;
            }
            cmd_features(&config, &output)
        }
        Commands::Score { input, output } => {
            input.apply(&mut config);
            cmd_score(&config, output.as_deref())
        }
        Commands::Windows {
            input,
            output,
            window,
        } => {
            input.apply(&mut config);
            window.apply(&mut config);
            cmd_windows(&config, &output)
        }
        Commands::Predict {
            input,
            stay_id,
            forecaster,
            window_size,
        } => {
            input.apply(&mut config);
            if let Some(size) = window_size {
                config.window_size = size;
            }
            cmd_predict(&config, &StayId::new(stay_id), forecaster)
        }
        Commands::Stats => {
            cmd_stats(&config);
            Ok(())
        }
        Commands::Config { init } => cmd_config(&config, init),
    }
}

impl InputArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(ref input) = self.input {
            config.input_path = input.clone();
        }
        if let Some(imputation) = self.imputation {
            config.imputation = imputation.into();
        }
    }
}

impl WindowArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(size) = self.window_size {
            config.window_size = size;
        }
        if let Some(alignment) = self.alignment {
            config.label_alignment = alignment.into();
        }
    }
}

/// Load the normalized table and record ingestion counts.
fn load(config: &Config, log: &RunLog) -> Result<LoadedTable> {
    log.record_run();
    let loaded = load_table(&config.input_path, config.imputation)
        .with_context(|| format!("could not ingest {}", config.input_path.display()))?;

    log.record_ingestion(
        loaded.sources_read as u64,
        loaded.skipped.len() as u64,
        loaded.table.len() as u64,
        loaded.report.rows_dropped as u64,
    );
    Ok(loaded)
}

fn open_log(config: &Config) -> RunLog {
    RunLog::with_persistence(config.run_stats_path())
}

fn save_log(log: &RunLog) {
    if let Err(e) = log.save() {
        tracing::warn!("Could not save run stats: {e}");
    }
}

fn cmd_process(config: &Config) -> Result<()> {
    println!("ICU Vitals v{VERSION}");
    println!();

    config
        .ensure_directories()
        .context("could not create output directories")?;
    let log = open_log(config);

    let loaded = load(config, &log)?;
    let series = group_by_stay(&loaded.table)?;
    let windower = config.windower()?;

    let table_path = config.export_path.join("normalized.csv");
    write_table(&loaded.table, &table_path)?;

    let features = extract_all(&series, config.feature_profile)?;
    let features_path = config.export_path.join("features.csv");
    features.write_csv(&features_path)?;

    let windows = windows_all(&series, &windower);
    let windows_path = config.export_path.join("windows.jsonl");
    windowing::write_jsonl(&windows, &windows_path)?;

    let report = ReportBuilder::new().build(assess_all(&series, &config.scoring));
    let report_path = config.export_path.join("report.json");
    std::fs::write(&report_path, report.to_json()?)?;

    log.record_patients(series.len() as u64);
    log.record_windows(windows.len() as u64);
    save_log(&log);

    println!("Sources read:     {}", loaded.sources_read);
    println!("Sources skipped:  {}", loaded.skipped.len());
    println!("Records:          {}", loaded.table.len());
    println!("Patients:         {}", series.len());
    println!(
        "Features:         {} ({:?} profile)",
        features.manifest().len(),
        config.feature_profile
    );
    println!("Windows:          {}", windows.len());
    println!();
    println!("Wrote:");
    for path in [&table_path, &features_path, &windows_path, &report_path] {
        println!("  {}", path.display());
    }
    println!();
    println!("{CLINICAL_DISCLAIMER}");

    Ok(())
}

fn cmd_features(config: &Config, output: &Path) -> Result<()> {
    let log = open_log(config);
    let loaded = load(config, &log)?;
    let series = group_by_stay(&loaded.table)?;

    let features = extract_all(&series, config.feature_profile)?;
    features
        .write_csv(output)
        .with_context(|| format!("could not write {}", output.display()))?;

    log.record_patients(series.len() as u64);
    save_log(&log);

    info!(path = %output.display(), "features written");
    println!(
        "Wrote {} feature vectors ({} features) to {}",
        features.len(),
        features.manifest().len(),
        output.display()
    );
    Ok(())
}

fn cmd_score(config: &Config, output: Option<&Path>) -> Result<()> {
    let log = open_log(config);
    let loaded = load(config, &log)?;
    let series = group_by_stay(&loaded.table)?;

    let report = ReportBuilder::new().build(assess_all(&series, &config.scoring));
    let json = report.to_json()?;

    log.record_patients(series.len() as u64);
    save_log(&log);

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("could not write {}", path.display()))?;
            println!(
                "Scored {} patients; report written to {}",
                report.summary.patient_count,
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_windows(config: &Config, output: &Path) -> Result<()> {
    let log = open_log(config);
    let loaded = load(config, &log)?;
    let series = group_by_stay(&loaded.table)?;
    let windower = config.windower()?;

    let windows = windows_all(&series, &windower);
    windowing::write_jsonl(&windows, output)
        .with_context(|| format!("could not write {}", output.display()))?;

    log.record_windows(windows.len() as u64);
    save_log(&log);

    println!(
        "Wrote {} windows of {} records to {}",
        windows.len(),
        windower.size(),
        output.display()
    );
    Ok(())
}

fn cmd_predict(config: &Config, stay_id: &StayId, forecaster: ForecasterArg) -> Result<()> {
    let log = open_log(config);
    let loaded = load(config, &log)?;

    let thresholds = config
        .thresholds()
        .context("risk thresholds are incomplete; run `icu-vitals config --init` or set them in the config file")?;
    let orchestrator = Orchestrator::new(config.windower()?, thresholds, &config.scoring);

    let predictor: Box<dyn SequencePredictor> = match forecaster {
        ForecasterArg::LastValue => Box::new(LastValueForecaster),
        ForecasterArg::WindowMean => Box::new(WindowMeanForecaster),
    };

    let envelope = orchestrator.report(&loaded.table, predictor.as_ref(), stay_id);
    if matches!(envelope, ReportEnvelope::Success(_)) {
        log.record_predictions(1);
    }
    save_log(&log);

    println!("{}", serde_json::to_string_pretty(&envelope)?);

    if let ReportEnvelope::Error { message } = envelope {
        anyhow::bail!(message);
    }
    Ok(())
}

fn cmd_stats(config: &Config) {
    let log = open_log(config);

    println!("ICU Vitals Run Statistics");
    println!("=========================");
    println!();
    println!("Stats file: {}", config.run_stats_path().display());
    println!();
    println!("{}", log.summary());
}

fn cmd_config(config: &Config, init: bool) -> Result<()> {
    let mut config = config.clone();
    if init {
        config.fill_reference_thresholds();
        config.save().context("could not write configuration")?;
        println!("Wrote {}", Config::config_path().display());
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
