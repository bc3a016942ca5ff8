//! Event monitoring

use chrono::{DateTime, Utc};
use clap::Args;
use stackforge_deploy::{ConsoleSink, MonitorOutcome};
use tracing::info;

use crate::commands::{interrupted, App};
use crate::error::{CliError, CliResult};

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Name of the stack to monitor
    pub stack_name: String,

    /// Don't skip old events
    #[arg(short, long)]
    pub all: bool,
}

/// Follow recent and upcoming events until the stack settles.
pub async fn monitor(args: MonitorArgs, app: &App) -> CliResult<()> {
    follow(app, &args.stack_name, &args.stack_name, None, !args.all).await?;
    Ok(())
}

/// Print events of `target` (stack name or id) until it reaches a terminal
/// status or the user interrupts. A failed or rolled back stack is an
/// error reported under `stack`.
pub async fn follow(
    app: &App,
    stack: &str,
    target: &str,
    since: Option<DateTime<Utc>>,
    skip_history: bool,
) -> CliResult<MonitorOutcome> {
    let mut monitor = app.monitor(target);
    if skip_history {
        monitor.prime().await?;
    }
    let mut sink = ConsoleSink;
    let outcome = monitor.run_until(since, &mut sink, interrupted()).await?;
    match &outcome {
        MonitorOutcome::Failed { status } => Err(CliError::StackFailed {
            stack: stack.to_string(),
            status: status.clone(),
        }),
        MonitorOutcome::Completed { status } => {
            info!(stack = %stack, status = %status, "Done");
            Ok(outcome)
        }
        MonitorOutcome::Interrupted => Ok(outcome),
    }
}
