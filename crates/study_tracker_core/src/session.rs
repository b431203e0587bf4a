//! crates/study_tracker_core/src/session.rs
//!
//! Holds the authenticated identity as an observable value and announces every
//! login/logout as a typed `SessionEvent`.

use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::domain::Identity;
use crate::ports::PortResult;

const EVENT_CAPACITY: usize = 16;

/// What is currently known about the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The initial session check has not answered yet.
    Resolving,
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<Identity> {
        match self {
            SessionState::Authenticated(id) => Some(*id),
            _ => None,
        }
    }
}

/// A transition of the session, consumed by the data cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Became(Identity),
    Cleared,
}

pub struct SessionStore {
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Resolving);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { state, events }
    }

    pub fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.current().identity()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Records a login. Returns the emitted event, or `None` if `identity`
    /// was already the active one.
    pub fn became(&self, identity: Identity) -> Option<SessionEvent> {
        self.transition(SessionState::Authenticated(identity))
    }

    /// Records a logout. Returns `None` if the session was already anonymous.
    pub fn cleared(&self) -> Option<SessionEvent> {
        self.transition(SessionState::Anonymous)
    }

    /// Applies the answer of the initial session check. A failed check counts
    /// as anonymous.
    pub fn resolve(&self, check: PortResult<Option<Identity>>) -> Option<SessionEvent> {
        match check {
            Ok(Some(identity)) => self.became(identity),
            Ok(None) | Err(_) => self.cleared(),
        }
    }

    fn transition(&self, next: SessionState) -> Option<SessionEvent> {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if !changed {
            return None;
        }

        let event = match next {
            SessionState::Authenticated(id) => {
                info!("Session became authenticated as {}", id);
                SessionEvent::Became(id)
            }
            _ => {
                info!("Session cleared");
                SessionEvent::Cleared
            }
        };
        // No subscribers is fine: the caller gets the event back as well.
        let _ = self.events.send(event);
        Some(event)
    }
}
