//! hooks-gateway server entry point.
//!
//! Evaluates the environment gate, loads the generated artifact, and runs
//! the startup pipeline. Any failure is logged and exits non-zero so the
//! supervising gateway process sees the boot fail.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use hooks_gateway::artifact::GatewayConfiguration;
use hooks_gateway::config::{self, ServerMode};
use hooks_gateway::plugins::hooks::{EchoDispatcher, HookDispatcher};
use hooks_gateway::server;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::log_filter())),
        )
        .init();

    let settings = match ServerMode::from_env() {
        Ok(ServerMode::Disabled) => {
            tracing::info!("hooks server disabled, exiting");
            return;
        }
        Ok(ServerMode::Enabled(settings)) => settings,
        Err(err) => {
            tracing::error!(error = %err, "could not start the hooks server");
            std::process::exit(1);
        }
    };

    let configuration = match GatewayConfiguration::load(&settings.working_dir) {
        Ok(configuration) => configuration,
        Err(err) => {
            tracing::error!(error = %err, "could not start the hooks server");
            std::process::exit(1);
        }
    };
    tracing::info!(
        api = %configuration.api_name,
        deployment = %configuration.deployment_name,
        "configuration loaded"
    );

    let dispatcher: Arc<dyn HookDispatcher> = Arc::new(EchoDispatcher);
    if let Err(err) = server::start(&settings, configuration, dispatcher).await {
        tracing::error!(error = %err, "could not start the hooks server");
        std::process::exit(1);
    }
}
