/// One-shot result delivery
///
/// A request owns exactly one sink. [`OneShot`] hands it out at most once;
/// every later settle attempt is logged and dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::error::BleError;

/// Receiver of a request's final outcome
pub trait ResultSink<T>: Send + Sync {
    fn deliver(&self, result: Result<T, BleError>);
}

impl<T, F> ResultSink<T> for F
where
    F: Fn(Result<T, BleError>) + Send + Sync,
{
    fn deliver(&self, result: Result<T, BleError>) {
        self(result)
    }
}

/// A settled outcome waiting to be handed to its sink. Built under the
/// session lock, sent after it is released.
#[must_use = "a delivery does nothing until sent"]
pub struct Delivery<T> {
    sink: Box<dyn ResultSink<T>>,
    result: Result<T, BleError>,
}

impl<T> Delivery<T> {
    pub fn send(self) {
        self.sink.deliver(self.result);
    }
}

/// Single-use guard around a request's sink
pub struct OneShot<T> {
    label: &'static str,
    sink: Option<Box<dyn ResultSink<T>>>,
}

impl<T> OneShot<T> {
    pub fn new(label: &'static str, sink: Box<dyn ResultSink<T>>) -> Self {
        Self {
            label,
            sink: Some(sink),
        }
    }

    /// Whether a result has already been handed out
    pub fn is_resolved(&self) -> bool {
        self.sink.is_none()
    }

    /// Consume the sink for `result`. Returns `None` if the request was
    /// already resolved.
    pub fn settle(&mut self, result: Result<T, BleError>) -> Option<Delivery<T>> {
        match self.sink.take() {
            Some(sink) => Some(Delivery { sink, result }),
            None => {
                match &result {
                    Ok(_) => tracing::warn!("Suppressed second {} result", self.label),
                    Err(e) => tracing::warn!("Suppressed second {} error: {}", self.label, e),
                }
                None
            }
        }
    }
}

/// Sink that forwards the outcome into a tokio oneshot channel
pub struct ChannelSink<T> {
    tx: Mutex<Option<oneshot::Sender<Result<T, BleError>>>>,
}

impl<T: Send> ResultSink<T> for ChannelSink<T> {
    fn deliver(&self, result: Result<T, BleError>) {
        if let Some(tx) = self.tx.lock().take() {
            // Receiver may have been dropped by a caller that gave up waiting
            let _ = tx.send(result);
        }
    }
}

/// Create a sink/receiver pair for awaiting a request from async Rust code
pub fn channel_sink<T: Send>() -> (ChannelSink<T>, oneshot::Receiver<Result<T, BleError>>) {
    let (tx, rx) = oneshot::channel();
    (
        ChannelSink {
            tx: Mutex::new(Some(tx)),
        },
        rx,
    )
}

/// Sink that records every delivery; used to assert exactly-once behavior
#[derive(Clone)]
pub struct RecordingSink<T> {
    results: Arc<Mutex<Vec<Result<T, BleError>>>>,
}

impl<T> Default for RecordingSink<T> {
    fn default() -> Self {
        Self {
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> RecordingSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<Result<T, BleError>> {
        self.results.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.results.lock().len()
    }
}

impl<T: Send> ResultSink<T> for RecordingSink<T> {
    fn deliver(&self, result: Result<T, BleError>) {
        self.results.lock().push(result);
    }
}
