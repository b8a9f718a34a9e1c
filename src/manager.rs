//! The idle/active state machine.
//!
//! One driver task per machine owns the event source, the current state
//! and the single pending debounce deadline. Every qualifying activity
//! event re-arms the deadline (sliding window); the deadline expiring is
//! the only path from active to idle besides the document going hidden.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, trace, warn};

use crate::config::IdleConfig;
use crate::domain::{ActivityEvent, EventName, IdleState};
use crate::registry::{Callback, Registry, Subscription};
use crate::source::{ActivitySource, SourceError};

/// Handle to a running idle machine.
///
/// Created with [`IdleManager::spawn`]; consumers subscribe to state
/// changes with [`on`](Self::on) and tear the machine down with
/// [`off`](Self::off). Dropping the handle also stops the driver, but
/// `off` is the explicit contract.
pub struct IdleManager {
    registry: Arc<Mutex<Registry>>,
    shutdown: CancellationToken,
    _stop_on_drop: DropGuard,
}

impl IdleManager {
    /// Start a machine over the given event source.
    ///
    /// Must be called from within a Tokio runtime. The starting state is
    /// seeded immediately, so an `active` start arms the inactivity
    /// countdown relative to construction time, not the first observed
    /// event.
    pub fn spawn<S>(config: &IdleConfig, source: S) -> Self
    where
        S: ActivitySource + 'static,
    {
        let registry = Arc::new(Mutex::new(Registry::new()));
        let shutdown = CancellationToken::new();

        let mut machine = Machine {
            state: IdleState::Active,
            deadline: None,
            time_to_idle: config.time_to_idle(),
            events: config.subscribed_events(),
            registry: Arc::clone(&registry),
        };
        machine.transition(config.initial_state);

        tokio::spawn(drive(source, machine, shutdown.clone()));

        Self {
            registry,
            _stop_on_drop: shutdown.clone().drop_guard(),
            shutdown,
        }
    }

    /// Subscribe to transitions into `state`.
    ///
    /// The callback fires on every future transition into that state; it
    /// is never invoked at subscribe time, even if the machine is already
    /// there. Registering the same [`Callback`] twice under one state is a
    /// no-op. After [`off`](Self::off), registration is a no-op too.
    pub fn on(&self, state: IdleState, callback: Callback) -> Subscription {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(state, &callback);
        Subscription::new(&self.registry, state, &callback)
    }

    /// Tear the machine down.
    ///
    /// Stops the driver (dropping the event source, so later events are
    /// unobserved), cancels the pending deadline and clears every
    /// registered listener. Idempotent.
    pub fn off(&self) {
        self.shutdown.cancel();
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// State owned by the driver task.
struct Machine {
    state: IdleState,
    /// The single pending debounce deadline, if armed.
    deadline: Option<Instant>,
    time_to_idle: Duration,
    /// Subscribed event set: `active_events` minus `ignored_events`.
    events: HashSet<EventName>,
    registry: Arc<Mutex<Registry>>,
}

impl Machine {
    /// Map one observed event onto a state request.
    ///
    /// Unsubscribed events are inert. The visibility-change event follows
    /// the source's hidden flag; everything else counts as activity.
    fn handle_event(&mut self, event: &ActivityEvent, hidden: bool) {
        if !self.events.contains(&event.name) {
            trace!(event = %event.name, "unsubscribed event, ignoring");
            return;
        }

        if event.name.is_visibility_change() {
            if hidden {
                self.transition(IdleState::Idle);
            } else {
                self.transition(IdleState::Active);
            }
        } else {
            self.transition(IdleState::Active);
        }
    }

    /// Request a state.
    ///
    /// Always cancels the pending deadline; a request for `Active` arms a
    /// fresh one, so repeated activity keeps pushing the idle moment out.
    /// Listeners fire only when the stored state actually changes.
    fn transition(&mut self, new_state: IdleState) {
        self.deadline = None;
        if new_state == IdleState::Active {
            self.deadline = Some(Instant::now() + self.time_to_idle);
        }

        if new_state != self.state {
            debug!(from = %self.state, to = %new_state, "idle state changed");
            self.state = new_state;
            self.notify(new_state);
        }
    }

    /// Invoke the listeners registered for `state`, in insertion order.
    ///
    /// Dispatch iterates a snapshot taken at transition time. A panicking
    /// listener halts the remaining dispatch in this pass but does not
    /// take the machine down.
    fn notify(&self, state: IdleState) {
        let callbacks = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot(state);

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                error!(state = %state, "listener panicked, aborting remaining dispatch");
                break;
            }
        }
    }
}

/// One wakeup of the driver loop.
enum Step {
    Shutdown,
    Timeout,
    Event(ActivityEvent),
    SourceDone(SourceError),
}

/// Driver loop: waits on teardown, the debounce deadline and the next
/// source event, whichever comes first.
async fn drive<S>(mut source: S, mut machine: Machine, shutdown: CancellationToken)
where
    S: ActivitySource,
{
    let mut source_open = true;

    loop {
        let deadline = machine.deadline;

        let step = tokio::select! {
            () = shutdown.cancelled() => Step::Shutdown,

            () = wait_until(deadline), if deadline.is_some() => Step::Timeout,

            event = source.next_event(), if source_open => match event {
                Ok(event) => Step::Event(event),
                Err(e) => Step::SourceDone(e),
            },
        };

        match step {
            Step::Shutdown => {
                trace!("idle machine stopped");
                break;
            }
            Step::Timeout => machine.transition(IdleState::Idle),
            Step::Event(event) => {
                // Visibility is read at handling time, not carried on the
                // event.
                let hidden = source.is_hidden();
                machine.handle_event(&event, hidden);
            }
            Step::SourceDone(SourceError::Closed) => {
                debug!("activity source closed");
                source_open = false;
            }
            Step::SourceDone(e) => {
                warn!("activity source error: {e}");
                source_open = false;
            }
        }

        // With the source gone and no deadline armed, nothing can ever
        // change state again.
        if !source_open && machine.deadline.is_none() {
            break;
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
