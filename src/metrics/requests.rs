use crate::metrics::function::{FunctionCounter, FunctionGauge, FunctionTimer, MeterId, Unit};
use crate::request_metrics::RequestMetrics;
use prometheus::Registry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const TIMER_REQUESTS: MeterId =
    MeterId::new("undertow.requests", "Number of requests", Unit::Milliseconds);
pub const GAUGE_REQUEST_TIME_MAX: MeterId = MeterId::new(
    "undertow.request.time.max",
    "The longest request duration in time",
    Unit::Milliseconds,
);
pub const GAUGE_REQUEST_TIME_MIN: MeterId = MeterId::new(
    "undertow.request.time.min",
    "The shortest request duration in time",
    Unit::Milliseconds,
);
pub const COUNTER_REQUEST_ERRORS: MeterId = MeterId::new(
    "undertow.request.errors",
    "Total number of error requests",
    Unit::None,
);

/// What the request timer reports as its total time.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerTotalTime {
    /// The shortest request duration. Kept for compatibility with existing
    /// dashboards, although it is not a cumulative time.
    #[default]
    MinRequestTime,
    TotalRequestTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub timer_total_time: TimerTotalTime,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            timer_total_time: TimerTotalTime::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndertowMeterBinder {
    config: Config,
}

impl UndertowMeterBinder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn bind(
        &self,
        registry: &Registry,
        metrics_handler: Arc<RequestMetrics>,
    ) -> anyhow::Result<()> {
        if !self.config.enabled {
            tracing::info!("Request metrics are disabled");
            return Ok(());
        }

        let total_time = self.config.timer_total_time;
        FunctionTimer::new(
            &TIMER_REQUESTS,
            metrics_handler.clone(),
            |m| m.total_requests(),
            move |m| match total_time {
                TimerTotalTime::MinRequestTime => m.min_request_time() as f64,
                TimerTotalTime::TotalRequestTime => m.total_request_time() as f64,
            },
        )?
        .register(registry)?;

        FunctionGauge::new(&GAUGE_REQUEST_TIME_MAX, metrics_handler.clone(), |m| {
            m.max_request_time() as f64
        })?
        .register(registry)?;

        FunctionGauge::new(&GAUGE_REQUEST_TIME_MIN, metrics_handler.clone(), |m| {
            m.min_request_time() as f64
        })?
        .register(registry)?;

        FunctionCounter::new(&COUNTER_REQUEST_ERRORS, metrics_handler, |m| {
            m.total_errors() as f64
        })?
        .register(registry)?;

        Ok(())
    }
}
