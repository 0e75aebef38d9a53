use std::error::Error;
use std::sync::Arc;
use tokio::runtime::Handle;
use undertow_metrics::bootstrap::{
    build_runtime, on_application_ready, register_runtime_worker, unregister_runtime_worker,
};
use undertow_metrics::config::{
    Configuration, get_config_base_path, print_config, should_print_config_and_exit,
};
use undertow_metrics::logging::setup_logging;
use undertow_metrics::management::ManagementServer;
use undertow_metrics::request_metrics::MetricsHandlerWrapper;
use undertow_metrics::server::start_server;
use undertow_metrics::server::state::AppState;

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let configuration = Configuration::load(get_config_base_path(std::env::args())?)?;
    if should_print_config_and_exit(std::env::args()) {
        print_config(&configuration)?;
        return Ok(());
    }

    let _guard = setup_logging(&configuration.log)?;
    let runtime = build_runtime(&configuration.runtime)?;

    runtime.block_on(run(configuration))
}

async fn run(configuration: Configuration) -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing::info!("Starting undertow-metrics");

    let registry = prometheus::Registry::new();
    let management = Arc::new(ManagementServer::new());
    register_runtime_worker(&configuration.runtime, &management, Handle::current())?;

    let metrics_wrapper = MetricsHandlerWrapper::new();
    if let Err(error) = on_application_ready(
        &configuration.metrics,
        &registry,
        &metrics_wrapper,
        management.clone(),
    ) {
        tracing::error!(?error, "Failed to bind the undertow meters");
    }

    let configuration = Arc::new(configuration);
    let state = AppState {
        configuration: configuration.clone(),
        registry,
        metrics_wrapper,
    };

    let served = start_server(state).await;
    unregister_runtime_worker(&configuration.runtime, &management);
    served?;
    tracing::info!("Bye!");

    Ok(())
}
