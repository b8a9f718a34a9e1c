//! Activity event sources.
//!
//! The machine never binds to an ambient global event target; it observes
//! whatever source it is constructed with. This module provides the source
//! abstraction plus an in-process channel-backed implementation suitable
//! for wiring up any host (or a test).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::{ActivityEvent, EventName, VISIBILITY_CHANGE};

/// Trait for activity event sources.
#[async_trait]
pub trait ActivitySource: Send {
    /// Get the next activity event.
    ///
    /// This method blocks until an event occurs or the source is exhausted.
    async fn next_event(&mut self) -> Result<ActivityEvent, SourceError>;

    /// Whether the observed surface is currently hidden.
    ///
    /// Consulted when a visibility-change event is handled, not carried on
    /// the event itself. Sources without a visibility concept report
    /// visible.
    fn is_hidden(&self) -> bool {
        false
    }
}

/// Errors that can occur in event delivery.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("event source closed")]
    Closed,

    #[error("failed to read from event source: {0}")]
    Read(String),
}

/// Create a connected sender/source pair.
///
/// The [`ActivitySender`] side is cheap to clone and feeds events into the
/// [`ChannelSource`] consumed by a machine. Dropping every sender closes
/// the source.
pub fn channel() -> (ActivitySender, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    let hidden = Arc::new(AtomicBool::new(false));
    (
        ActivitySender {
            tx,
            hidden: Arc::clone(&hidden),
        },
        ChannelSource { rx, hidden },
    )
}

/// Producer half of an in-process activity channel.
#[derive(Debug, Clone)]
pub struct ActivitySender {
    tx: mpsc::UnboundedSender<ActivityEvent>,
    hidden: Arc<AtomicBool>,
}

impl ActivitySender {
    /// Emit a named activity event.
    ///
    /// Events emitted after the consuming machine is gone are dropped.
    pub fn emit(&self, name: impl Into<EventName>) {
        let event = ActivityEvent::new(name);
        if self.tx.send(event).is_err() {
            trace!("activity channel closed, event dropped");
        }
    }

    /// Update the visibility flag and emit a visibility-change event,
    /// mirroring how a document both flips its visibility state and fires
    /// the change notification.
    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::Relaxed);
        self.emit(VISIBILITY_CHANGE);
    }
}

/// Consumer half of an in-process activity channel.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<ActivityEvent>,
    hidden: Arc<AtomicBool>,
}

#[async_trait]
impl ActivitySource for ChannelSource {
    async fn next_event(&mut self) -> Result<ActivityEvent, SourceError> {
        self.rx.recv().await.ok_or(SourceError::Closed)
    }

    fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Relaxed)
    }
}
