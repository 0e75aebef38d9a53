//! Request metrics handler for the HTTP server's handler chain.
//!
//! [`MetricsLayer`] wraps a service and records the duration and the outcome of
//! every request into a shared [`RequestMetrics`]. A request fails when the
//! inner service returns an error, responds with a 5xx status or is dropped
//! before completing.

use axum::http::{Request, Response};
use pin_project::{pin_project, pinned_drop};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tower::{Layer, Service};

const NO_REQUESTS: u64 = u64::MAX;

/// Snapshot of the accumulated request figures. Times are in milliseconds.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MetricResult {
    pub metrics_start: SystemTime,
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_request_time: u64,
    pub min_request_time: u64,
    pub max_request_time: u64,
}

#[derive(Debug)]
pub struct RequestMetrics {
    metrics_start: Mutex<SystemTime>,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_request_time: AtomicU64,
    min_request_time: AtomicU64,
    max_request_time: AtomicU64,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self {
            metrics_start: Mutex::new(SystemTime::now()),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_request_time: AtomicU64::new(0),
            min_request_time: AtomicU64::new(NO_REQUESTS),
            max_request_time: AtomicU64::new(0),
        }
    }
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, request_time: Duration, failed: bool) {
        let millis = u64::try_from(request_time.as_millis()).unwrap_or(u64::MAX - 1);

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_request_time.fetch_add(millis, Ordering::Relaxed);
        self.max_request_time.fetch_max(millis, Ordering::Relaxed);
        self.min_request_time.fetch_min(millis, Ordering::Relaxed);

        if failed {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn total_request_time(&self) -> u64 {
        self.total_request_time.load(Ordering::Relaxed)
    }

    /// Zero until the first request is recorded.
    pub fn min_request_time(&self) -> u64 {
        match self.min_request_time.load(Ordering::Relaxed) {
            NO_REQUESTS => 0,
            millis => millis,
        }
    }

    pub fn max_request_time(&self) -> u64 {
        self.max_request_time.load(Ordering::Relaxed)
    }

    pub fn metrics_start(&self) -> SystemTime {
        *self.metrics_start.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> MetricResult {
        MetricResult {
            metrics_start: self.metrics_start(),
            total_requests: self.total_requests(),
            total_errors: self.total_errors(),
            total_request_time: self.total_request_time(),
            min_request_time: self.min_request_time(),
            max_request_time: self.max_request_time(),
        }
    }

    pub fn reset(&self) {
        let mut start = self.metrics_start.lock().unwrap_or_else(|e| e.into_inner());

        self.total_requests.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        self.total_request_time.store(0, Ordering::Relaxed);
        self.min_request_time.store(NO_REQUESTS, Ordering::Relaxed);
        self.max_request_time.store(0, Ordering::Relaxed);
        *start = SystemTime::now();
    }
}

/// Keeps the metrics handler that is installed into the server's handler chain
/// so it can be read after the server has started.
#[derive(Debug, Clone, Default)]
pub struct MetricsHandlerWrapper {
    metrics_handler: Arc<RequestMetrics>,
}

impl MetricsHandlerWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self) -> MetricsLayer {
        MetricsLayer::new(self.metrics_handler.clone())
    }

    pub fn metrics_handler(&self) -> Arc<RequestMetrics> {
        self.metrics_handler.clone()
    }
}

#[derive(Debug, Clone)]
pub struct MetricsLayer {
    metrics: Arc<RequestMetrics>,
}

impl MetricsLayer {
    pub fn new(metrics: Arc<RequestMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
    metrics: Arc<RequestMetrics>,
}

impl<S, B, U> Service<Request<B>> for MetricsService<S>
where
    S: Service<Request<B>, Response = Response<U>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        MetricsFuture {
            inner: self.inner.call(req),
            metrics: self.metrics.clone(),
            start: Instant::now(),
            recorded: false,
        }
    }
}

#[pin_project(PinnedDrop)]
pub struct MetricsFuture<F> {
    #[pin]
    inner: F,
    metrics: Arc<RequestMetrics>,
    start: Instant,
    recorded: bool,
}

impl<F, U, E> Future for MetricsFuture<F>
where
    F: Future<Output = Result<Response<U>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));

        let failed = match &result {
            Ok(response) => response.status().is_server_error(),
            Err(_) => true,
        };
        this.metrics.record(this.start.elapsed(), failed);
        *this.recorded = true;

        Poll::Ready(result)
    }
}

/// An aborted exchange, e.g. a client disconnect, still counts as a failed
/// request.
#[pinned_drop]
impl<F> PinnedDrop for MetricsFuture<F> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if !*this.recorded {
            this.metrics.record(this.start.elapsed(), true);
        }
    }
}
