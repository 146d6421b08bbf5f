// src/main.rs

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::debug;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Context;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        println!("modman v{}", env!("CARGO_PKG_VERSION"));
        println!("Run 'modman --help' for usage information");
        return Ok(());
    };

    let ctx = Context::load(&cli.config, cli.root.as_deref(), cli.no_pkg)?;
    debug!("Loaded {} module source(s)", ctx.registry.sources().len());

    match command {
        Commands::List => commands::cmd_list(&ctx),
        Commands::ListEnabled { show_requirements } => {
            commands::cmd_list_enabled(&ctx, show_requirements)
        }
        Commands::Info { name } => commands::cmd_info(&ctx, &name),
        Commands::Enable { module, profile } => commands::cmd_enable(&ctx, &module, profile),
        Commands::Disable { module } => commands::cmd_disable(&ctx, &module),
        Commands::Upgrade { module } => commands::cmd_upgrade(&ctx, &module),
        Commands::Rebase { module } => commands::cmd_rebase(&ctx, &module),
        Commands::Search {
            name,
            version,
            release,
            requires,
            license,
            json,
        } => {
            let query = commands::build_query(name, version, release, requires, license, json)?;
            commands::cmd_search(&ctx, &query)
        }
        Commands::Refresh => commands::cmd_refresh(&ctx),
        Commands::Summary => commands::cmd_summary(&ctx),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
