//! Test doubles shared by the unit tests.

use crate::management::{AttributeSource, AttributeValue, LookupError, ObjectName};
use prometheus::{Registry, TextEncoder};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
enum Response {
    Value(AttributeValue),
    ConnectionError,
}

/// Attribute source that answers from a fixed table.
#[derive(Default)]
pub struct HardcodedAttributeSource {
    responses: Mutex<HashMap<(ObjectName, String), Response>>,
    lookups: AtomicUsize,
}

impl HardcodedAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, object: &ObjectName, attribute: &str, value: AttributeValue) {
        self.set_value(object, attribute, value);
    }

    pub fn set_value(&self, object: &ObjectName, attribute: &str, value: AttributeValue) {
        self.respond(object, attribute, Response::Value(value));
    }

    pub fn add_connection_error(&mut self, object: &ObjectName, attribute: &str) {
        self.respond(object, attribute, Response::ConnectionError);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    fn respond(&self, object: &ObjectName, attribute: &str, response: Response) {
        self.responses
            .lock()
            .unwrap()
            .insert((object.clone(), attribute.to_owned()), response);
    }
}

impl AttributeSource for HardcodedAttributeSource {
    fn attribute(
        &self,
        object: &ObjectName,
        attribute: &str,
    ) -> Result<AttributeValue, LookupError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let responses = self.responses.lock().unwrap();
        match responses.get(&(object.clone(), attribute.to_owned())) {
            Some(Response::Value(value)) => Ok(value.clone()),
            Some(Response::ConnectionError) => {
                Err(LookupError::Connection("connection refused".to_owned()))
            }
            None if responses.keys().any(|(o, _)| o == object) => {
                Err(LookupError::AttributeNotFound {
                    object: object.clone(),
                    attribute: attribute.to_owned(),
                })
            }
            None => Err(LookupError::InstanceNotFound(object.clone())),
        }
    }
}

/// Reads a single sample from the text exposition of `registry`.
///
/// `series` is the metric name followed by its labels exactly as the text
/// encoder prints them, e.g. `up{job="a"}`.
pub fn sample(registry: &Registry, series: &str) -> Option<f64> {
    let text = TextEncoder::new()
        .encode_to_string(&registry.gather())
        .unwrap();

    text.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.rsplit_once(' '))
        .find(|(name, _)| *name == series)
        .map(|(_, value)| value.parse::<f64>().unwrap())
}

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns everything it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let capture = LogCapture::default();
    let writer = capture.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&capture.0.lock().unwrap()).into_owned();

    (result, logs)
}

pub fn warnings(logs: &str) -> usize {
    logs.lines().filter(|line| line.contains(" WARN ")).count()
}
