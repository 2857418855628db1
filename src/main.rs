use std::process::ExitCode;
use std::sync::Arc;

use aerie_provision::executor::RealCommandExecutor;
use aerie_provision::{cli, init_logging, run_provision, run_validate};
use tracing::error;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Completions write straight to stdout and need no logging setup.
    if let cli::Commands::Completions(opts) = &args.command {
        cli::generate_completions(opts);
        return ExitCode::SUCCESS;
    }

    let log_level = match &args.command {
        cli::Commands::Provision(opts) => opts.common.log_level,
        cli::Commands::Validate(opts) => opts.common.log_level,
        cli::Commands::Completions(_) => cli::LogLevel::Info,
    };

    if let Err(e) = init_logging(log_level) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match &args.command {
        cli::Commands::Provision(opts) => {
            let executor = Arc::new(RealCommandExecutor {
                dry_run: opts.dry_run,
            });
            match run_provision(opts, executor) {
                Ok(report) => {
                    println!(
                        "provisioned `{}` via {}",
                        report.dataset.name, report.provenance
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("provisioning failed: {:#}", e);
                    eprintln!("provisioning failed: {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
        cli::Commands::Validate(opts) => match run_validate(opts) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("validation failed: {:#}", e);
                ExitCode::FAILURE
            }
        },
        cli::Commands::Completions(_) => ExitCode::SUCCESS,
    }
}
