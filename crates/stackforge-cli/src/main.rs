//! Stackforge CLI - compile and deploy CloudFormation templates
//!
//! This CLI provides a terminal interface to:
//! - Compile templates with includes, embedded payloads and shorthand tags
//! - Create, update, delete and monitor stacks
//! - Scale and recycle auto scaling groups, invalidate CloudFront caches

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod output;
mod params;

use commands::{compile, fleet, monitor, stack, App};
use config::CliConfig;
use error::CliResult;
use output::print_error;
use stackforge_aws::AwsContext;

/// Stackforge CLI application
#[derive(Parser)]
#[command(name = "stackforge")]
#[command(about = "Compile and deploy CloudFormation templates", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "STACKFORGE_CONFIG")]
    config: Option<String>,

    /// AWS region to use
    #[arg(short, long, env = "AWS_DEFAULT_REGION")]
    region: Option<String>,

    /// AWS credentials profile to use
    #[arg(short, long)]
    profile: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// List CloudFormation stacks
    List,

    /// List template parameters and their default values
    Parameters(compile::ParametersArgs),

    /// Compile the specified template
    Compile(compile::CompileArgs),

    /// Monitor recent and upcoming events on the stack
    Monitor(monitor::MonitorArgs),

    /// Create a stack from the template or update an existing stack
    Create(stack::CreateArgs),

    /// Check the current status of a stack
    Status(stack::StackArgs),

    /// Delete an existing stack
    Delete(stack::StackArgs),

    /// List auto scaling groups of a stack
    Groups(fleet::GroupsArgs),

    /// Set the number of desired instances in an auto scaling group
    Scale(fleet::ScaleArgs),

    /// Replace every instance in the stack's auto scaling groups
    Recycle(fleet::RecycleArgs),

    /// Invalidate the stack's CloudFront caches
    Invalidate(fleet::InvalidateArgs),

    /// Retrieve output values from the stack
    Output(stack::StackArgs),

    /// Show resolved configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    // Load config
    let config = CliConfig::load(cli.config.as_deref())?;
    let cwd = std::env::current_dir()?;
    let region = config.region(cli.region.as_deref());
    let profile = config.profile(cli.profile.as_deref(), &cwd);

    let aws = AwsContext::load(region, profile).await;
    let app = App::new(aws, config, cli.output)?;

    // Execute command
    match cli.command {
        Commands::List => stack::list(&app).await,
        Commands::Parameters(args) => compile::parameters(args, &app),
        Commands::Compile(args) => compile::compile(args, &app).await,
        Commands::Monitor(args) => monitor::monitor(args, &app).await,
        Commands::Create(args) => stack::create(args, &app).await,
        Commands::Status(args) => stack::status(args, &app).await,
        Commands::Delete(args) => stack::delete(args, &app).await,
        Commands::Groups(args) => fleet::groups(args, &app).await,
        Commands::Scale(args) => fleet::scale(args, &app).await,
        Commands::Recycle(args) => fleet::recycle(args, &app).await,
        Commands::Invalidate(args) => fleet::invalidate(args, &app).await,
        Commands::Output(args) => stack::output(args, &app).await,
        Commands::Config => {
            println!("Region: {}", app.aws().region());
            println!("Profile: {}", app.aws().profile());
            let rendered = toml::to_string_pretty(&app.config)
                .map_err(|e| error::CliError::Config(e.to_string()))?;
            print!("{rendered}");
            Ok(())
        }
    }
}
