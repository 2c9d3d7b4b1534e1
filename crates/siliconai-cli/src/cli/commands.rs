use super::CliError;
use super::helpers::{load_config, print_json};
use siliconai_core::config::ValidatorConfig;
use siliconai_core::export::{ExportSummary, Exporter};
use siliconai_core::import::Importer;
use siliconai_core::scheduling::{ShardPool, first_failure};
use siliconai_core::validate::{RecoValidator, Validator};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(clap::Args)]
pub(super) struct ConfigArgs {
    /// Write the default configuration to the configuration path
    #[arg(long)]
    generate: bool,
}

#[derive(clap::Args)]
pub(super) struct ExportArgs {
    /// Only keep fixed-length sequences (the most frequent length)
    #[arg(long)]
    fixed_length: bool,

    /// Export a single shard (numbered from 1)
    #[arg(short = 't', long)]
    task_id: Option<usize>,
}

#[derive(clap::Args)]
pub(super) struct ImportArgs {
    /// Results file to import
    #[arg(short = 'f', long, env = "SILICONAI_VALIDATOR_FILE")]
    file: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct ValidateArgs {
    /// Results file to validate
    #[arg(short = 'f', long, env = "SILICONAI_VALIDATOR_FILE")]
    file: PathBuf,

    /// Restrict the comparison to one event
    #[arg(short = 'e', long)]
    event: Option<u32>,
}

#[derive(clap::Args)]
pub(super) struct ValidateRecoArgs {
    /// Only compare reconstruction efficiencies
    #[arg(long, conflicts_with = "tracks")]
    performance: bool,

    /// Only compare fitted track parameters
    #[arg(long)]
    tracks: bool,
}

pub(super) fn run_config_command(path: &Path, args: ConfigArgs) -> Result<i32, CliError> {
    if args.generate {
        ValidatorConfig::write_default(path)?;
        println!("Configuration written to {}", path.display());
        return Ok(0);
    }

    let config = load_config(path)?;
    print_json(&config)?;
    Ok(0)
}

pub(super) fn run_export_command(path: &Path, args: ExportArgs) -> Result<i32, CliError> {
    let config = load_config(path)?;
    let geometry = config.load_geometry()?;
    let exporter = Exporter::new(&config, geometry)
        .with_fixed_length(args.fixed_length || config.fixed_length);
    let pool = ShardPool::new(config.threads);

    info!("exporting data");
    let outcomes = exporter.export_all(&pool, args.task_id)?;
    let summaries: Vec<&ExportSummary> = outcomes
        .iter()
        .filter_map(|outcome| outcome.result.as_ref().ok())
        .collect();
    print_json(&summaries)?;

    match first_failure(&outcomes) {
        Some(error) => Err(CliError::Compute(error)),
        None => Ok(0),
    }
}

pub(super) fn run_import_command(path: &Path, args: ImportArgs) -> Result<i32, CliError> {
    let config = load_config(path)?;
    let importer = Importer::new(&config, config.load_geometry()?);

    info!("importing results");
    let summary = importer.import_file(&args.file)?;
    print_json(&summary)?;
    Ok(0)
}

pub(super) fn run_validate_command(path: &Path, args: ValidateArgs) -> Result<i32, CliError> {
    let config = load_config(path)?;
    let validator = Validator::new(&config, config.load_geometry()?);

    info!("validating results");
    let (output, _) = validator.validate_file(&args.file, args.event)?;
    println!("Validation written to {}", output.display());
    Ok(0)
}

pub(super) fn run_validate_reco_command(
    path: &Path,
    args: ValidateRecoArgs,
) -> Result<i32, CliError> {
    let config = load_config(path)?;
    let validator = RecoValidator::new(&config);
    let both = !args.performance && !args.tracks;

    info!("validating reconstruction results");
    if args.performance || both {
        let output = validator.write_performance()?;
        println!("Validation written to {}", output.display());
    }
    if args.tracks || both {
        let output = validator.write_tracks()?;
        println!("Validation written to {}", output.display());
    }
    Ok(0)
}
