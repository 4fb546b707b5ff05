//! Callback registrations for engine events

use std::fmt;
use std::sync::Arc;

use cadence_domain::{EventCause, SyncEngineEvent};
use parking_lot::RwLock;

/// Listener invoked with every event of the kind it registered for.
pub type EventCallback = Arc<dyn Fn(&SyncEngineEvent) + Send + Sync>;

/// Registered listeners, shared between the scheduler and its owner.
///
/// Retry-time events go to `on_retry_time_changed` listeners; every other
/// cause goes to `on_state_changed` listeners.
#[derive(Clone, Default)]
pub struct SyncEventListeners {
    state_changed: Arc<RwLock<Vec<EventCallback>>>,
    retry_time_changed: Arc<RwLock<Vec<EventCallback>>>,
}

impl SyncEventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_state_changed(&self, callback: impl Fn(&SyncEngineEvent) + Send + Sync + 'static) {
        self.state_changed.write().push(Arc::new(callback));
    }

    pub fn on_retry_time_changed(
        &self,
        callback: impl Fn(&SyncEngineEvent) + Send + Sync + 'static,
    ) {
        self.retry_time_changed.write().push(Arc::new(callback));
    }

    /// Delivers `event` to the matching listeners.
    ///
    /// The listener list is cloned before delivery so a callback may register
    /// further listeners.
    pub fn notify(&self, event: &SyncEngineEvent) {
        let targets: Vec<EventCallback> = match event.cause {
            EventCause::RetryTimeChanged => self.retry_time_changed.read().clone(),
            _ => self.state_changed.read().clone(),
        };
        for callback in targets {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.state_changed.read().len() + self.retry_time_changed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SyncEventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEventListeners")
            .field("state_changed", &self.state_changed.read().len())
            .field("retry_time_changed", &self.retry_time_changed.read().len())
            .finish()
    }
}
