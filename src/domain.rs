//! Domain types for idle detection.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Event name that flips the machine based on document visibility rather
/// than counting as plain activity.
pub const VISIBILITY_CHANGE: &str = "visibilitychange";

/// The two mutually exclusive states of the machine.
///
/// Exactly one is current at any time; transitions are the only way to
/// change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    /// Recent activity was observed (or the machine was started this way).
    #[default]
    Active,
    /// No activity for the configured window, or the document went hidden.
    Idle,
}

impl IdleState {
    /// Get the state as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for IdleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of an input event that counts as an activity signal (newtype for
/// type safety).
///
/// Names are opaque to the machine; anything outside the subscribed set is
/// silently inert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(String);

impl EventName {
    /// Create a new event name.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the distinguished visibility-change event.
    pub fn is_visibility_change(&self) -> bool {
        self.0 == VISIBILITY_CHANGE
    }
}

impl From<String> for EventName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single activity signal delivered by an event source.
///
/// The visibility boolean is deliberately not carried here; it is read
/// from the source at handling time.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    /// Name of the input event that fired.
    pub name: EventName,
}

impl ActivityEvent {
    /// Create a new activity event.
    pub fn new(name: impl Into<EventName>) -> Self {
        Self { name: name.into() }
    }
}
