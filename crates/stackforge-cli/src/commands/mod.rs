//! CLI command implementations

pub mod compile;
pub mod fleet;
pub mod monitor;
pub mod stack;

use std::sync::Arc;

use stackforge_aws::AwsContext;
use stackforge_compiler::{Compiler, FetchConfig, HttpFetcher};
use stackforge_deploy::{
    DeploymentController, EventMonitor, Fleet, FleetConfig, MonitorConfig, OrchestrationClient,
};
use stackforge_store::ArtifactStore;

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::OutputFormat;

/// Everything a command needs, built once per invocation.
pub struct App {
    pub config: CliConfig,
    pub format: OutputFormat,
    aws: AwsContext,
    store: ArtifactStore,
    orchestrator: Arc<dyn OrchestrationClient>,
    fetcher: Arc<HttpFetcher>,
}

impl App {
    pub fn new(aws: AwsContext, config: CliConfig, format: OutputFormat) -> CliResult<Self> {
        let store = ArtifactStore::new(Arc::new(aws.s3(config.store.clone())), config.store.clone());
        let orchestrator: Arc<dyn OrchestrationClient> = Arc::new(aws.cloudformation());
        let fetcher = Arc::new(HttpFetcher::new(config.fetch.apply(FetchConfig::default()))?);
        Ok(Self {
            config,
            format,
            aws,
            store,
            orchestrator,
            fetcher,
        })
    }

    pub fn aws(&self) -> &AwsContext {
        &self.aws
    }

    pub fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }

    pub fn compiler(&self) -> Compiler {
        Compiler::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.config.compile.clone(),
        )
    }

    pub fn controller(&self) -> DeploymentController {
        DeploymentController::new(self.orchestrator.clone(), Arc::new(self.compiler()))
    }

    pub fn monitor(&self, stack: &str) -> EventMonitor {
        EventMonitor::with_config(
            self.orchestrator.clone(),
            stack,
            self.config.monitor.apply(MonitorConfig::default()),
        )
    }

    pub fn fleet(&self) -> Fleet {
        Fleet::with_config(
            self.orchestrator.clone(),
            Arc::new(self.aws.autoscaling()),
            Arc::new(self.aws.cloudfront()),
            self.config.fleet.apply(FleetConfig::default()),
        )
    }
}

/// Resolves once the user interrupts the process.
pub async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; never interrupt
        std::future::pending::<()>().await;
    }
}
