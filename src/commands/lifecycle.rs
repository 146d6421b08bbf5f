// src/commands/lifecycle.rs
//! Enable, disable, upgrade and rebase commands

use super::Context;
use anyhow::Result;
use modman::Action;
use tracing::info;

fn run_action(ctx: &Context, action: Action, module: &str, profiles: Vec<String>) -> Result<()> {
    info!("Running {} {}", action, module);
    let mut orchestrator = ctx.orchestrator(profiles)?;
    let result = orchestrator.execute(action, module);

    if let Some(session) = orchestrator.take_session() {
        session.close();
    }

    let plan = result?;
    if plan.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }
    for line in plan.summary() {
        println!("{}", line);
    }
    Ok(())
}

/// Enable a module with its requirements
pub fn cmd_enable(ctx: &Context, module: &str, profiles: Vec<String>) -> Result<()> {
    run_action(ctx, Action::Enable, module, profiles)
}

/// Disable a module and what it leaves unneeded
pub fn cmd_disable(ctx: &Context, module: &str) -> Result<()> {
    run_action(ctx, Action::Disable, module, Vec::new())
}

/// Upgrade an enabled module to its newest version
pub fn cmd_upgrade(ctx: &Context, module: &str) -> Result<()> {
    run_action(ctx, Action::Upgrade, module, Vec::new())
}

/// Switch an enabled module to the version named by `module`
pub fn cmd_rebase(ctx: &Context, module: &str) -> Result<()> {
    run_action(ctx, Action::Rebase, module, Vec::new())
}
