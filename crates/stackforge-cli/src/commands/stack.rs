//! Stack commands: list, create, status, delete, output

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Args;
use serde::Serialize;
use stackforge_compiler::resolve_template_path;
use stackforge_deploy::{DeployAction, DeployError};
use stackforge_types::{StackOutput, StackSummary};
use tabled::Tabled;
use tracing::info;

use crate::commands::monitor::follow;
use crate::commands::App;
use crate::error::{CliError, CliResult};
use crate::output::{print_info, print_output, print_single, print_success, OutputFormat};
use crate::params::ParamArgs;

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Template main file or directory
    pub file: PathBuf,

    /// Name of the stack to create or update. Defaults to the template's directory name
    pub stack_name: Option<String>,

    #[command(flatten)]
    pub params: ParamArgs,
}

#[derive(Debug, Args)]
pub struct StackArgs {
    /// Stack name
    pub stack_name: String,
}

/// Table row for stack listings
#[derive(Debug, Serialize, Tabled)]
struct StackRow {
    name: String,
    status: String,
}

impl From<StackSummary> for StackRow {
    fn from(s: StackSummary) -> Self {
        Self {
            name: s.name,
            status: s.status,
        }
    }
}

/// List live stacks.
pub async fn list(app: &App) -> CliResult<()> {
    let stacks = app.controller().list().await?;
    print_output(stacks.into_iter().map(StackRow::from).collect(), app.format)
}

/// Compile, deploy and follow a stack, then print its outputs.
pub async fn create(args: CreateArgs, app: &App) -> CliResult<()> {
    let name = match args.stack_name {
        Some(name) => name,
        None => default_stack_name(&args.file, &app.config.compile.default_filename)?,
    };
    let bindings = args.params.bindings(app.fetcher()).await?;

    info!(stack = %name, "Creating stack");
    let start = Utc::now();
    let controller = app.controller();
    let outcome = controller
        .deploy_template(&name, &args.file, &bindings)
        .await?;

    match outcome.action {
        DeployAction::Unchanged => {
            print_info(&format!("Stack {name} is up to date"));
        }
        DeployAction::Created | DeployAction::Updated => {
            info!(
                stack = %name,
                id = outcome.stack_id.as_deref().unwrap_or_default(),
                action = ?outcome.action,
                "Submitted"
            );
            follow(app, &name, &name, Some(start), false).await?;
        }
    }

    print_outputs(&controller.outputs(&name).await?, app.format)
}

/// Report whether a stack exists and its status.
pub async fn status(args: StackArgs, app: &App) -> CliResult<()> {
    let summary = app.controller().status(&args.stack_name).await?;
    match app.format {
        OutputFormat::Table => {
            let mut line = format!("{}: {}", summary.name, summary.status);
            if let Some(reason) = &summary.status_reason {
                line.push_str(&format!(" ({reason})"));
            }
            print_success(&line);
            Ok(())
        }
        format => print_single(&summary, format),
    }
}

/// Delete a stack and follow it until it is gone.
pub async fn delete(args: StackArgs, app: &App) -> CliResult<()> {
    let name = &args.stack_name;
    let start = Utc::now();
    let id = app.controller().delete(name).await?;
    info!(stack = %name, "Deleted stack");

    match follow(app, name, &id, Some(start), false).await {
        Ok(_) | Err(CliError::Deploy(DeployError::NotFound { .. })) => {
            print_success(&format!("Stack {name} deleted"));
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Print stack outputs.
pub async fn output(args: StackArgs, app: &App) -> CliResult<()> {
    let outputs = app.controller().outputs(&args.stack_name).await?;
    print_outputs(&outputs, app.format)
}

fn print_outputs(outputs: &[StackOutput], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            for output in outputs {
                println!("{}: {}", output.key, output.value);
            }
            Ok(())
        }
        format => print_single(&outputs, format),
    }
}

/// Name of the directory holding the template.
fn default_stack_name(file: &Path, default_filename: &str) -> CliResult<String> {
    let path = std::fs::canonicalize(resolve_template_path(file, default_filename))?;
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CliError::InvalidInput(format!(
                "Cannot derive a stack name from {}; pass one explicitly",
                file.display()
            ))
        })
}
