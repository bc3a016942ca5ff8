//! Fleet commands: groups, scale, recycle, invalidate

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::commands::App;
use crate::error::CliResult;
use crate::output::{print_output, print_success, OutputFormat};

#[derive(Debug, Args)]
pub struct GroupsArgs {
    /// Name of the stack to list auto scaling groups from
    pub stack_name: String,
}

#[derive(Debug, Args)]
pub struct ScaleArgs {
    /// Name of the stack holding the group
    pub stack_name: String,

    /// Auto scaling group (logical id or group name)
    pub group: String,

    /// Number of instances desired
    pub scale: i32,
}

#[derive(Debug, Args)]
pub struct RecycleArgs {
    /// Name of the stack holding the groups
    pub stack_name: String,

    /// Only recycle this group (logical id or group name)
    pub group: Option<String>,
}

#[derive(Debug, Args)]
pub struct InvalidateArgs {
    /// Name of the stack to invalidate CloudFront caches in
    pub stack_name: String,
}

#[derive(Debug, Serialize, Tabled)]
struct GroupRow {
    logical_id: String,
    name: String,
}

/// List auto scaling groups of a stack.
pub async fn groups(args: GroupsArgs, app: &App) -> CliResult<()> {
    let groups = app.fleet().scaling_groups(&args.stack_name).await?;
    match app.format {
        OutputFormat::Table => {
            let width = groups.iter().map(|g| g.logical_id.len()).max().unwrap_or(0);
            for group in &groups {
                println!("{:<width$}\t => {}", group.logical_id, group.name);
            }
            Ok(())
        }
        format => print_output(
            groups
                .into_iter()
                .map(|g| GroupRow {
                    logical_id: g.logical_id,
                    name: g.name,
                })
                .collect(),
            format,
        ),
    }
}

/// Set desired capacity and wait for the group to settle.
pub async fn scale(args: ScaleArgs, app: &App) -> CliResult<()> {
    let states = app
        .fleet()
        .scale(&args.stack_name, Some(&args.group), args.scale)
        .await?;
    for state in states {
        print_success(&format!(
            "Done updating {} - current scale: {}",
            state.name,
            state.describe()
        ));
    }
    Ok(())
}

/// Replace every instance of the stack's groups.
pub async fn recycle(args: RecycleArgs, app: &App) -> CliResult<()> {
    let reports = app
        .fleet()
        .recycle(&args.stack_name, args.group.as_deref())
        .await?;
    for report in reports {
        print_success(&format!(
            "{}: recycled {} instance{}",
            report.group,
            report.replaced,
            if report.replaced == 1 { "" } else { "s" }
        ));
    }
    Ok(())
}

/// Invalidate every CloudFront distribution of the stack.
pub async fn invalidate(args: InvalidateArgs, app: &App) -> CliResult<()> {
    let reports = app.fleet().invalidate(&args.stack_name).await?;
    for report in reports {
        let aliases = if report.aliases.is_empty() {
            String::new()
        } else {
            format!(" ({})", report.aliases.join(", "))
        };
        print_success(&format!(
            "Invalidation {} on {}{}: {}",
            report.invalidation.id, report.distribution, aliases, report.invalidation.status
        ));
    }
    Ok(())
}
