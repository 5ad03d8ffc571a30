use std::process::ExitCode;

use clap::Parser;
use log::{debug, error};

use peakflow::runtime::{self, Commands, LogLevel, EXIT_USAGE};

#[derive(Parser)]
#[command(version, about = "Orchestration of a scATAC-seq peak analysis pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// trace, debug, info, warn, error or off; RUST_LOG applies when unset
    #[arg(long = "log-level", global = true)]
    log_level: Option<LogLevel>,

    /// Only log warnings and errors
    #[arg(long = "quiet", short = 'q', global = true)]
    quiet: bool,
}

fn main() -> ExitCode {
    let mut cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            //--help and --version are not errors
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    runtime::setup_global_logger(runtime::resolve_log_level(cli.log_level, cli.quiet));
    debug!("Running {:?}", cli.command);

    if let Err(e) = cli.command.try_execute() {
        error!("{:#}", e);
        return ExitCode::from(runtime::exit_code_for(&e));
    }
    ExitCode::SUCCESS
}
