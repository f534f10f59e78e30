// ABOUTME: Entry point for the stackpilot CLI application.
// ABOUTME: Parses arguments, sets up tracing and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use stackpilot::config;
use stackpilot::error::Result;
use stackpilot::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode).verbose(cli.verbose);
    output.start_timer();

    if let Err(e) = run(cli.command, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: &Output) -> Result<()> {
    match command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Params {
            template,
            previous,
            parameters,
            no_previous_parameters,
        } => {
            let request = commands::ParamsRequest {
                template,
                previous,
                overrides: parameters.into_iter().collect(),
                use_previous_parameters: !no_previous_parameters,
            };
            commands::params(request, output).await
        }
        Commands::ImportPlan {
            deployed,
            desired,
            mapping,
            force,
        } => {
            let request = commands::ImportPlanRequest {
                deployed,
                desired,
                mapping,
                force,
            };
            commands::import_plan(request, output).await
        }
    }
}
