use crate::domain::MeterBinder;
use crate::management::worker::{
    ATTR_CORE_WORKER_POOL_SIZE, ATTR_IO_THREAD_COUNT, ATTR_MAX_WORKER_POOL_SIZE,
    ATTR_WORKER_QUEUE_SIZE,
};
use crate::management::{AttributeSource, LookupError, ObjectName};
use crate::metrics::function::{MeterId, MeterKind, Unit};
use crate::metrics::util::{family, gauge_metric, into_labels};
use prometheus::Registry;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{MetricFamily, MetricType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_WORKER: &str = "XNIO-1";

const LABEL_WORKER: &str = "worker";

const WORKER_GAUGES: [(MeterId, &str); 4] = [
    (
        MeterId::new(
            "undertow.worker.queue.size",
            "Undertow worker queue size",
            Unit::None,
        ),
        ATTR_WORKER_QUEUE_SIZE,
    ),
    (
        MeterId::new(
            "undertow.worker.pool.size",
            "Undertow worker pool size",
            Unit::None,
        ),
        ATTR_CORE_WORKER_POOL_SIZE,
    ),
    (
        MeterId::new(
            "undertow.worker.pool.max",
            "Undertow max worker pool size",
            Unit::None,
        ),
        ATTR_MAX_WORKER_POOL_SIZE,
    ),
    (
        MeterId::new(
            "undertow.io.thread-count",
            "Undertow IO thread count",
            Unit::None,
        ),
        ATTR_IO_THREAD_COUNT,
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    /// Worker identifiers such as `XNIO-1`, or full object names when the
    /// entry contains a domain separator.
    pub workers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: vec![DEFAULT_WORKER.to_owned()],
        }
    }
}

#[derive(Debug)]
struct Worker {
    label: String,
    object_name: String,
}

impl Worker {
    fn new(entry: &str) -> Self {
        let object_name = if entry.contains(':') {
            entry.to_owned()
        } else {
            format!(
                "org.xnio:type=Xnio,provider=\"nio\",worker={}",
                ObjectName::quote(entry)
            )
        };

        Self {
            label: entry.to_owned(),
            object_name,
        }
    }
}

/// Publishes worker pool gauges that query the management interface on every
/// scrape.
pub struct UndertowWorkerMetrics {
    config: Config,
    source: Arc<dyn AttributeSource>,
}

impl UndertowWorkerMetrics {
    pub fn new(config: Config, source: Arc<dyn AttributeSource>) -> Self {
        Self { config, source }
    }

    fn workers(&self) -> Arc<[Worker]> {
        let mut workers: Vec<Worker> = Vec::with_capacity(self.config.workers.len());
        for label in &self.config.workers {
            if workers.iter().any(|w| &w.label == label) {
                tracing::warn!(worker = %label, "Ignoring duplicate worker");
                continue;
            }

            workers.push(Worker::new(label));
        }

        workers.into()
    }
}

impl MeterBinder for UndertowWorkerMetrics {
    fn bind_to(&self, registry: &Registry) -> anyhow::Result<()> {
        if !self.config.enabled {
            tracing::info!("Worker metrics are disabled");
            return Ok(());
        }

        let workers = self.workers();
        if workers.is_empty() {
            tracing::warn!("No workers configured. Skipping worker metrics");
            return Ok(());
        }

        for (id, attribute) in &WORKER_GAUGES {
            let gauge = WorkerAttributeGauge {
                desc: id.desc(MeterKind::Gauge, &[LABEL_WORKER])?,
                attribute: *attribute,
                workers: workers.clone(),
                source: self.source.clone(),
            };

            registry.register(Box::new(gauge))?;
        }

        Ok(())
    }
}

struct WorkerAttributeGauge {
    desc: Desc,
    attribute: &'static str,
    workers: Arc<[Worker]>,
    source: Arc<dyn AttributeSource>,
}

impl WorkerAttributeGauge {
    fn lookup(&self, worker: &Worker) -> Result<f64, LookupError> {
        let object_name = ObjectName::parse(&worker.object_name)?;
        self.source.numeric_attribute(&object_name, self.attribute)
    }

    fn value(&self, worker: &Worker) -> f64 {
        match self.lookup(worker) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    %error,
                    worker = %worker.label,
                    "Unable to get {} from the management interface",
                    self.attribute
                );
                0.0
            }
        }
    }
}

impl Collector for WorkerAttributeGauge {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let metrics = self
            .workers
            .iter()
            .map(|worker| {
                gauge_metric(
                    into_labels(&[(LABEL_WORKER, worker.label.as_str())]),
                    self.value(worker),
                )
            })
            .collect();

        vec![family(&self.desc, MetricType::GAUGE, metrics)]
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::MeterBinder;
    use crate::management::worker::{
        ATTR_CORE_WORKER_POOL_SIZE, ATTR_IO_THREAD_COUNT, ATTR_MAX_WORKER_POOL_SIZE,
        ATTR_WORKER_QUEUE_SIZE,
    };
    use crate::management::{AttributeValue, worker_object_name};
    use crate::metrics::worker::{Config, UndertowWorkerMetrics};
    use crate::test_support::{HardcodedAttributeSource, capture_logs, sample, warnings};
    use prometheus::Registry;
    use std::sync::Arc;

    const QUEUE_SIZE: &str = r#"undertow_worker_queue_size{worker="XNIO-1"}"#;

    fn full_worker(source: &mut HardcodedAttributeSource, worker: &str, queue: u64) {
        let name = worker_object_name(worker);
        source.add_value(&name, ATTR_WORKER_QUEUE_SIZE, AttributeValue::UInt(queue));
        source.add_value(&name, ATTR_CORE_WORKER_POOL_SIZE, AttributeValue::Int(8));
        source.add_value(&name, ATTR_MAX_WORKER_POOL_SIZE, AttributeValue::Int(64));
        source.add_value(&name, ATTR_IO_THREAD_COUNT, AttributeValue::Float(4.0));
    }

    fn bind(source: HardcodedAttributeSource, config: Config) -> Registry {
        let registry = Registry::new();
        UndertowWorkerMetrics::new(config, Arc::new(source))
            .bind_to(&registry)
            .unwrap();
        registry
    }

    #[test]
    fn test_gauges_report_attribute_values() {
        let mut source = HardcodedAttributeSource::new();
        full_worker(&mut source, "XNIO-1", 42);
        let registry = bind(source, Config::default());

        let (_, logs) = capture_logs(|| {
            assert_eq!(Some(42.0), sample(&registry, QUEUE_SIZE));
            assert_eq!(
                Some(8.0),
                sample(&registry, r#"undertow_worker_pool_size{worker="XNIO-1"}"#)
            );
            assert_eq!(
                Some(64.0),
                sample(&registry, r#"undertow_worker_pool_max{worker="XNIO-1"}"#)
            );
            assert_eq!(
                Some(4.0),
                sample(&registry, r#"undertow_io_thread_count{worker="XNIO-1"}"#)
            );
        });
        assert_eq!(0, warnings(&logs));
    }

    #[test]
    fn test_every_scrape_performs_a_fresh_lookup() {
        let mut source = HardcodedAttributeSource::new();
        full_worker(&mut source, "XNIO-1", 1);
        let source = Arc::new(source);

        let registry = Registry::new();
        UndertowWorkerMetrics::new(Config::default(), source.clone())
            .bind_to(&registry)
            .unwrap();

        assert_eq!(Some(1.0), sample(&registry, QUEUE_SIZE));
        source.set_value(
            &worker_object_name("XNIO-1"),
            ATTR_WORKER_QUEUE_SIZE,
            AttributeValue::UInt(17),
        );
        assert_eq!(Some(17.0), sample(&registry, QUEUE_SIZE));
        assert_eq!(8, source.lookups());
    }

    #[test]
    fn test_connection_error_reads_zero_and_warns_once() {
        let mut source = HardcodedAttributeSource::new();
        full_worker(&mut source, "XNIO-1", 42);
        source.add_connection_error(&worker_object_name("XNIO-1"), ATTR_WORKER_QUEUE_SIZE);
        let registry = bind(source, Config::default());

        let (value, logs) = capture_logs(|| sample(&registry, QUEUE_SIZE));
        assert_eq!(Some(0.0), value);
        assert_eq!(1, warnings(&logs));
        assert!(logs.contains("WorkerQueueSize"));
    }

    #[test]
    fn test_missing_attribute_reads_zero() {
        let mut source = HardcodedAttributeSource::new();
        source.add_value(
            &worker_object_name("XNIO-1"),
            ATTR_WORKER_QUEUE_SIZE,
            AttributeValue::UInt(3),
        );
        let registry = bind(source, Config::default());

        let (value, logs) = capture_logs(|| {
            sample(&registry, r#"undertow_worker_pool_max{worker="XNIO-1"}"#)
        });
        assert_eq!(Some(0.0), value);
        // one gather evaluates all four gauges, three of which are missing
        assert_eq!(3, warnings(&logs));
    }

    #[test]
    fn test_missing_object_reads_zero() {
        let registry = bind(HardcodedAttributeSource::new(), Config::default());

        let (value, logs) = capture_logs(|| sample(&registry, QUEUE_SIZE));
        assert_eq!(Some(0.0), value);
        assert_eq!(4, warnings(&logs));
    }

    #[test]
    fn test_non_numeric_attribute_reads_zero() {
        let mut source = HardcodedAttributeSource::new();
        full_worker(&mut source, "XNIO-1", 42);
        source.set_value(
            &worker_object_name("XNIO-1"),
            ATTR_WORKER_QUEUE_SIZE,
            AttributeValue::Text("many".to_owned()),
        );
        let registry = bind(source, Config::default());

        let (value, logs) = capture_logs(|| sample(&registry, QUEUE_SIZE));
        assert_eq!(Some(0.0), value);
        assert_eq!(1, warnings(&logs));
    }

    #[test]
    fn test_malformed_object_name_reads_zero() {
        let mut source = HardcodedAttributeSource::new();
        full_worker(&mut source, "XNIO-1", 42);

        let config = Config {
            enabled: true,
            workers: vec!["XNIO-1".to_owned(), "org.xnio:".to_owned()],
        };
        let registry = bind(source, config);

        let (values, logs) = capture_logs(|| {
            (
                sample(&registry, QUEUE_SIZE),
                sample(&registry, r#"undertow_worker_queue_size{worker="org.xnio:"}"#),
            )
        });
        assert_eq!((Some(42.0), Some(0.0)), values);
        // one gather evaluates all four gauges for the broken worker, twice
        assert_eq!(8, warnings(&logs));
        assert!(logs.contains("empty key property list"));
    }

    #[test]
    fn test_full_object_name_as_worker() {
        let mut source = HardcodedAttributeSource::new();
        full_worker(&mut source, "XNIO-7", 9);

        let entry = r#"org.xnio:worker="XNIO-7",provider="nio",type=Xnio"#;
        let config = Config {
            enabled: true,
            workers: vec![entry.to_owned()],
        };
        let registry = bind(source, config);

        let series = format!(
            "undertow_worker_queue_size{{worker=\"{}\"}}",
            entry.replace('"', "\\\"")
        );
        assert_eq!(Some(9.0), sample(&registry, &series));
    }

    #[test]
    fn test_one_series_per_worker() {
        let mut source = HardcodedAttributeSource::new();
        full_worker(&mut source, "XNIO-1", 5);
        full_worker(&mut source, "XNIO-2", 6);

        let config = Config {
            enabled: true,
            workers: vec![
                "XNIO-1".to_owned(),
                "XNIO-2".to_owned(),
                "XNIO-1".to_owned(),
            ],
        };
        let registry = bind(source, config);

        assert_eq!(Some(5.0), sample(&registry, QUEUE_SIZE));
        assert_eq!(
            Some(6.0),
            sample(&registry, r#"undertow_worker_queue_size{worker="XNIO-2"}"#)
        );
    }

    #[test]
    fn test_binding_twice_is_rejected() {
        let registry = Registry::new();
        let metrics = UndertowWorkerMetrics::new(
            Config::default(),
            Arc::new(HardcodedAttributeSource::new()),
        );

        metrics.bind_to(&registry).unwrap();
        assert!(metrics.bind_to(&registry).is_err());
    }

    #[test]
    fn test_concurrent_scrapes() {
        let mut source = HardcodedAttributeSource::new();
        full_worker(&mut source, "XNIO-1", 42);
        let registry = bind(source, Config::default());
        let registry = &registry;

        let readings = std::thread::scope(|s| {
            let handles = (0..2)
                .map(|_| {
                    s.spawn(move || {
                        (0..100)
                            .map(|_| sample(registry, QUEUE_SIZE))
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(200, readings.len());
        assert!(readings.iter().all(|r| *r == Some(42.0)));
    }
}
