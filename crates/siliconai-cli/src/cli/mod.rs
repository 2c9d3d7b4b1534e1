mod commands;
mod helpers;

use clap::Parser;
use siliconai_core::config::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use siliconai_core::domain::ValidatorError;
use std::path::PathBuf;

const PROGRAM_NAME: &str = "siliconai-validator";

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let validator_error = error.as_validator_error();
            eprintln!("{}", validator_error.report());
            validator_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once(PROGRAM_NAME.to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();

    match Cli::try_parse_from(&full_args) {
        Ok(cli) => {
            helpers::init_logging(cli.debug);
            dispatch_parsed(cli.config, cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "siliconai-validator",
    version,
    about = "Export, import and validate simulated hits for surrogate-model comparison"
)]
struct Cli {
    /// Configuration file
    #[arg(
        short = 'c',
        long,
        global = true,
        env = CONFIG_ENV_VAR,
        default_value = DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Run with debug printouts
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Print or generate the configuration
    Config(commands::ConfigArgs),
    /// Export simulated hits into encoded artifacts
    Export(commands::ExportArgs),
    /// Import model results into engine-schema hit files
    Import(commands::ImportArgs),
    /// Compare reference and generated hits of a results file
    Validate(commands::ValidateArgs),
    /// Compare reference and generated reconstruction outputs
    ValidateReco(commands::ValidateRecoArgs),
}

fn dispatch_parsed(config: PathBuf, command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Config(args) => commands::run_config_command(&config, args),
        CliCommand::Export(args) => commands::run_export_command(&config, args),
        CliCommand::Import(args) => commands::run_import_command(&config, args),
        CliCommand::Validate(args) => commands::run_validate_command(&config, args),
        CliCommand::ValidateReco(args) => commands::run_validate_reco_command(&config, args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(ValidatorError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_validator_error(&self) -> ValidatorError {
        match self {
            Self::Usage(message) => ValidatorError::schema("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => ValidatorError::internal("RUN.CLI", format!("{error:#}")),
        }
    }
}

impl From<ValidatorError> for CliError {
    fn from(error: ValidatorError) -> Self {
        Self::Compute(error)
    }
}
