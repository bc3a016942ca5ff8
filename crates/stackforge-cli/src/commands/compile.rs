//! Template commands: compile, parameters

use std::path::PathBuf;

use clap::Args;
use stackforge_compiler::CloudInit;
use stackforge_types::scalar_to_string;

use crate::commands::App;
use crate::error::CliResult;
use crate::params::ParamArgs;

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Template main file or directory; `.init` files are compiled as cloud-init
    pub file: PathBuf,

    #[command(flatten)]
    pub params: ParamArgs,
}

#[derive(Debug, Args)]
pub struct ParametersArgs {
    /// Template main file or directory
    pub file: PathBuf,
}

/// Print the compiled template (or cloud-init document).
///
/// Payload references resolve through the given parameters and then the
/// template defaults, as they would on `create`.
pub async fn compile(args: CompileArgs, app: &App) -> CliResult<()> {
    if args.file.extension().is_some_and(|ext| ext == "init") {
        print!("{}", CloudInit::load(&args.file)?.compile()?);
        return Ok(());
    }
    let bindings = args.params.bindings(app.fetcher()).await?;
    let compiled = app
        .compiler()
        .compile_to_yaml(&args.file, Some(&bindings))
        .await?;
    print!("{compiled}");
    Ok(())
}

/// Print parameter names and their defaults.
pub fn parameters(args: ParametersArgs, app: &App) -> CliResult<()> {
    let params = app.compiler().parameters(&args.file)?;
    if !params.is_empty() {
        println!("---");
    }
    for (name, default) in params {
        let default = default
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_default();
        println!("{name}: {default}");
    }
    Ok(())
}
