mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands need no topology context.
        cli::Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Neither do completions.
        cli::Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "netforge", &mut std::io::stdout());
            Ok(())
        }

        command => {
            let mut config = netforge_config::load_config_or_default();
            if let Some(ref state_id) = cli.global.state_id {
                config.state_id = state_id.clone();
            }

            let executor = netforge_exec::HostExecutor::new(config.state_id.clone());
            let ctx = netforge_core::Context::new(config, Box::new(executor))
                .map_err(CliError::from)?;

            tracing::debug!(command = ?command, "dispatching command");
            commands::dispatch(command, &ctx, &cli.global)
        }
    }
}
