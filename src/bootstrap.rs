use crate::config::{Metrics, Runtime};
use crate::domain::MeterBinder;
use crate::management::worker::{RuntimeWorker, WorkerPoolSettings};
use crate::management::{AttributeSource, ManagementServer, worker_object_name};
use crate::metrics::requests::UndertowMeterBinder;
use crate::metrics::worker::UndertowWorkerMetrics;
use crate::request_metrics::MetricsHandlerWrapper;
use prometheus::Registry;
use std::sync::Arc;
use tokio::runtime::Handle;

pub fn build_runtime(config: &Runtime) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder
        .enable_all()
        .max_blocking_threads(config.max_blocking_threads)
        .thread_name(format!("{}-io", config.worker_name));

    if let Some(worker_threads) = config.worker_threads {
        builder.worker_threads(worker_threads);
    }

    builder.build()
}

/// Registers the tokio runtime behind `handle` as the I/O worker named in the
/// runtime configuration.
pub fn register_runtime_worker(
    config: &Runtime,
    management: &ManagementServer,
    handle: Handle,
) -> anyhow::Result<()> {
    let settings = WorkerPoolSettings {
        core_pool_size: config
            .worker_threads
            .unwrap_or_else(|| handle.metrics().num_workers()),
        max_pool_size: config.max_blocking_threads,
    };

    let worker = RuntimeWorker::new(config.worker_name.clone(), handle, settings);
    management.register(worker_object_name(&config.worker_name), Arc::new(worker))?;

    let registered = management
        .names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    tracing::info!(?registered, "Runtime worker registered");

    Ok(())
}

pub fn unregister_runtime_worker(config: &Runtime, management: &ManagementServer) {
    if let Err(error) = management.unregister(&worker_object_name(&config.worker_name)) {
        tracing::warn!(%error, "Failed to unregister the runtime worker");
    }
}

/// Binds every undertow meter. Call exactly once, after the registry and the
/// management interface are available.
pub fn on_application_ready(
    config: &Metrics,
    registry: &Registry,
    wrapper: &MetricsHandlerWrapper,
    attribute_source: Arc<dyn AttributeSource>,
) -> anyhow::Result<()> {
    UndertowMeterBinder::new(config.requests.clone()).bind(registry, wrapper.metrics_handler())?;
    UndertowWorkerMetrics::new(config.worker.clone(), attribute_source).bind_to(registry)?;

    tracing::info!("Undertow meters bound");
    Ok(())
}
