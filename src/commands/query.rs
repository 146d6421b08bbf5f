// src/commands/query.rs
//! Read-only commands: list, info, search, summary and refresh

use super::Context;
use anyhow::{bail, Result};
use modman::{search, CompareOp, SearchFilter, SearchQuery};
use std::collections::BTreeMap;
use tracing::info;

/// List available modules
pub fn cmd_list(ctx: &Context) -> Result<()> {
    info!("Listing available modules");
    let catalog = ctx.registry.list_modules(false)?;
    if catalog.is_empty() {
        println!("No modules available");
    } else {
        println!("{}", catalog.brief_description());
    }
    Ok(())
}

/// List enabled modules; dependency pull-ins only with `show_requirements`
pub fn cmd_list_enabled(ctx: &Context, show_requirements: bool) -> Result<()> {
    let filter = if show_requirements { None } else { Some(true) };
    let catalog = ctx.registry.load_enabled(filter)?;
    if catalog.is_empty() {
        println!("No modules enabled");
    } else {
        println!("{}", catalog.brief_description());
    }
    Ok(())
}

/// Full description of every version of a module
pub fn cmd_info(ctx: &Context, name: &str) -> Result<()> {
    info!("Showing module {}", name);
    let catalog = ctx.registry.info_modules(name)?;
    println!("{}", catalog.full_description(name)?);
    Ok(())
}

/// The search query described by the command-line flags
pub fn build_query(
    names: Vec<String>,
    version: Option<Vec<String>>,
    release: Option<Vec<String>>,
    requires: Vec<String>,
    licenses: Vec<String>,
    json: Option<String>,
) -> Result<SearchQuery> {
    if let Some(json) = json {
        return Ok(SearchQuery::from_json(&json)?);
    }

    let mut query = SearchQuery::new();
    if !names.is_empty() {
        query.push(SearchFilter::Name(names));
    }
    if let Some([op, value]) = version.as_deref() {
        query.push(SearchFilter::Version(CompareOp::parse(op)?, value.clone()));
    }
    if let Some([op, value]) = release.as_deref() {
        query.push(SearchFilter::Release(CompareOp::parse(op)?, value.clone()));
    }
    if !requires.is_empty() {
        if requires.len() % 2 != 0 {
            bail!("--requires takes a module name and a stream");
        }
        let map: BTreeMap<String, String> = requires
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        query.push(SearchFilter::Requires(map));
    }
    if !licenses.is_empty() {
        query.push(SearchFilter::License(licenses));
    }
    Ok(query)
}

/// Search available modules
pub fn cmd_search(ctx: &Context, query: &SearchQuery) -> Result<()> {
    let catalog = ctx.registry.list_modules(false)?;
    let found = search(&catalog, query)?;
    if found.is_empty() {
        println!("No matching modules");
    } else {
        println!("{}", found.brief_description());
    }
    Ok(())
}

/// Refetch every module source
pub fn cmd_refresh(ctx: &Context) -> Result<()> {
    info!("Refreshing module listings");
    let catalog = ctx.registry.refresh()?;
    println!(
        "Refreshed {} module(s), {} record(s)",
        catalog.names().len(),
        catalog.len()
    );
    Ok(())
}

/// Counts of available and enabled modules
pub fn cmd_summary(ctx: &Context) -> Result<()> {
    let available = ctx.registry.list_modules(false)?;
    let enabled = ctx.registry.load_enabled(None)?;
    let by_user = enabled.iter().filter(|e| e.enabled_by_user()).count();

    println!(
        "Available modules: {} ({} record(s))",
        available.names().len(),
        available.len()
    );
    println!(
        "Enabled modules: {} ({} enabled by user)",
        enabled.len(),
        by_user
    );
    println!("Module sources: {}", ctx.registry.sources().len());
    Ok(())
}
