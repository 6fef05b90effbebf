mod commands;
mod helpers;

use clap::Parser;
use solparam_core::domain::ParamError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let param_error = error.as_param_error();
            eprintln!("{}", param_error.diagnostic_line());
            param_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("solparam".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
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
#[command(name = "solparam", about = "Material parameter database for semiconductor modelling")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// List discovered parameter sources in search order
    Sources(commands::SourcesArgs),
    /// List the materials stored in one source
    Materials(commands::MaterialsArgs),
    /// List the parameters one source stores for a material
    Parameters(commands::ParametersArgs),
    /// Resolve parameters for a material across the sources
    Get(commands::GetArgs),
    /// Resolve the complex refractive index of a material
    Nk(commands::NkArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Sources(args) => commands::run_sources_command(args),
        CliCommand::Materials(args) => commands::run_materials_command(args),
        CliCommand::Parameters(args) => commands::run_parameters_command(args),
        CliCommand::Get(args) => commands::run_get_command(args),
        CliCommand::Nk(args) => commands::run_nk_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(ParamError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ParamError> for CliError {
    fn from(error: ParamError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_param_error(&self) -> ParamError {
        match self {
            Self::Usage(message) => ParamError::invalid_input("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => ParamError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
