//! # Alert Dispatcher
//!
//! Hands engine signals to notification collaborators after the write
//! transaction that produced them has committed.
//!
//! ## Fan-out
//! ```text
//!  committed operation
//!       │ Vec<StockSignal>
//!       ▼
//!  AlertDispatcher ──┬──▶ BroadcastSink  (tokio broadcast, live subscribers)
//!                    ├──▶ LogSink        (structured tracing events)
//!                    └──▶ any AlertSink
//! ```
//!
//! Delivery is best-effort and at-least-once per triggering event. A sink
//! failure is logged and never reaches the caller, since the ledger write it
//! reports on is already durable.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use toko_core::{AlertPriority, StockSignal};

/// Failure to hand a signal to one sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink closed")]
    Closed,

    #[error("delivery failed: {0}")]
    Failed(String),
}

/// A notification collaborator.
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    fn deliver(&self, signal: &StockSignal) -> Result<(), SinkError>;
}

// =============================================================================
// Broadcast Sink
// =============================================================================

/// Publishes signals on a tokio broadcast channel.
///
/// Having no subscribers is not a failure; signals are simply dropped.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StockSignal>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        BroadcastSink { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StockSignal> {
        self.tx.subscribe()
    }
}

impl AlertSink for BroadcastSink {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn deliver(&self, signal: &StockSignal) -> Result<(), SinkError> {
        match self.tx.send(signal.clone()) {
            Ok(receivers) => {
                debug!(signal = signal.name(), receivers, "Signal broadcast");
            }
            Err(_) => {
                debug!(signal = signal.name(), "No subscribers for signal");
            }
        }
        Ok(())
    }
}

// =============================================================================
// Log Sink
// =============================================================================

/// Writes every signal as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, signal: &StockSignal) -> Result<(), SinkError> {
        let payload =
            serde_json::to_string(signal).map_err(|e| SinkError::Failed(e.to_string()))?;

        match signal.priority() {
            Some(AlertPriority::Critical) | Some(AlertPriority::Warning) => {
                warn!(target: "toko::alerts", signal = signal.name(), %payload, "Stock alert");
            }
            Some(AlertPriority::Medium) => {
                info!(target: "toko::alerts", signal = signal.name(), %payload, "Stock alert");
            }
            None => {
                debug!(target: "toko::alerts", signal = signal.name(), %payload, "Stock event");
            }
        }
        Ok(())
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Fans signals out to every registered sink.
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("AlertDispatcher").field("sinks", &names).finish()
    }
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Delivers each signal to each sink. Returns the number of failed deliveries.
    pub fn dispatch(&self, signals: &[StockSignal]) -> usize {
        let mut failures = 0;

        for signal in signals {
            for sink in &self.sinks {
                if let Err(e) = sink.deliver(signal) {
                    failures += 1;
                    warn!(
                        sink = sink.name(),
                        signal = signal.name(),
                        error = %e,
                        "Alert delivery failed"
                    );
                }
            }
        }

        failures
    }
}
