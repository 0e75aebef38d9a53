use crate::management::{AttributeValue, ManagedObject};
use tokio::runtime::Handle;

pub const ATTR_WORKER_QUEUE_SIZE: &str = "WorkerQueueSize";
pub const ATTR_CORE_WORKER_POOL_SIZE: &str = "CoreWorkerPoolSize";
pub const ATTR_MAX_WORKER_POOL_SIZE: &str = "MaxWorkerPoolSize";
pub const ATTR_IO_THREAD_COUNT: &str = "IoThreadCount";
pub const ATTR_NAME: &str = "Name";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WorkerPoolSettings {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
}

/// Exposes the live figures of a tokio runtime as a worker object.
pub struct RuntimeWorker {
    name: String,
    handle: Handle,
    settings: WorkerPoolSettings,
}

impl RuntimeWorker {
    pub fn new(name: impl Into<String>, handle: Handle, settings: WorkerPoolSettings) -> Self {
        Self {
            name: name.into(),
            handle,
            settings,
        }
    }
}

impl ManagedObject for RuntimeWorker {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        let metrics = self.handle.metrics();

        match name {
            ATTR_WORKER_QUEUE_SIZE => Some(metrics.global_queue_depth().into()),
            ATTR_IO_THREAD_COUNT => Some(metrics.num_workers().into()),
            ATTR_CORE_WORKER_POOL_SIZE => Some(self.settings.core_pool_size.into()),
            ATTR_MAX_WORKER_POOL_SIZE => Some(self.settings.max_pool_size.into()),
            ATTR_NAME => Some(self.name.as_str().into()),
            _ => None,
        }
    }

    fn attribute_names(&self) -> Vec<&'static str> {
        vec![
            ATTR_WORKER_QUEUE_SIZE,
            ATTR_CORE_WORKER_POOL_SIZE,
            ATTR_MAX_WORKER_POOL_SIZE,
            ATTR_IO_THREAD_COUNT,
            ATTR_NAME,
        ]
    }
}
