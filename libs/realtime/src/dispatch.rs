//! Inbound frame dispatch and the subscriber registry.
//!
//! Owned by the connection driver task. Subscribe and unsubscribe requests
//! arrive over the command channel, so the registry is never mutated
//! concurrently with a delivery pass.

use std::panic::{self, AssertUnwindSafe};

use tracing::{error, warn};
use types::{Envelope, Role};

/// Callback invoked for each delivered envelope.
pub(crate) type Callback = Box<dyn Fn(&Envelope) + Send + 'static>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

/// Role filter plus ordered subscriber registry for one connection.
pub(crate) struct Dispatcher {
    role: Role,
    subscribers: Vec<Subscriber>,
}

impl Dispatcher {
    pub(crate) fn new(role: Role) -> Self {
        Self {
            role,
            subscribers: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Append a subscriber. The `id` is allocated by the connection handle so
    /// the matching disposer can be handed out before this runs.
    pub(crate) fn subscribe(&mut self, id: u64, callback: Callback) {
        self.subscribers.push(Subscriber { id, callback });
    }

    /// Remove a subscriber. Unknown ids are a no-op, which keeps disposers
    /// idempotent.
    pub(crate) fn unsubscribe(&mut self, id: u64) {
        self.subscribers.retain(|s| s.id != id);
    }

    /// Decode one raw text frame and deliver it if it is addressed to this
    /// connection's role or to everyone.
    pub(crate) fn handle_frame(&self, raw: &str) {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Discarding malformed frame: {}", e);
                return;
            }
        };

        // Other roles sharing the fan-out endpoint are the common case, not
        // worth a log line.
        if !envelope.is_for(self.role) {
            return;
        }

        self.deliver(&envelope);
    }

    /// Invoke every subscriber in registration order. A panicking callback is
    /// isolated so the remaining subscribers still see the envelope.
    pub(crate) fn deliver(&self, envelope: &Envelope) {
        for subscriber in &self.subscribers {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(envelope)));
            if outcome.is_err() {
                error!(
                    "Subscriber {} panicked handling a {} envelope",
                    subscriber.id,
                    envelope.kind()
                );
            }
        }
    }
}
