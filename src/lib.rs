//! idle-manager - user idle/active detection with debounced transitions.
//!
//! An [`IdleManager`] watches a stream of named activity events and keeps a
//! two-state machine: any qualifying event makes it `active` and re-arms a
//! sliding inactivity countdown; the countdown expiring (or the observed
//! surface going hidden) makes it `idle`. Consumers subscribe to
//! transitions with [`IdleManager::on`] and tear down with
//! [`IdleManager::off`].
//!
//! Events arrive through the injectable [`ActivitySource`] seam; the
//! [`channel`] source covers in-process hosts and tests.

pub mod config;
pub mod domain;
pub mod manager;
pub mod registry;
pub mod source;

pub use config::{DEFAULT_TIME_TO_IDLE_MS, IdleConfig, default_active_events};
pub use domain::{ActivityEvent, EventName, IdleState, VISIBILITY_CHANGE};
pub use manager::IdleManager;
pub use registry::{Callback, Subscription, callback};
pub use source::{ActivitySender, ActivitySource, ChannelSource, SourceError, channel};
