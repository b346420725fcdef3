//! Bookkeeping for invocations currently inside the guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightRequest {
    pub channel: String,
    pub request_id: Uuid,
    pub start_time_ms: u64,
    /// Who issued the call: the peer address for socket clients, `local` in-process.
    pub caller: String,
    pub arg_count: usize,
}

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<Uuid, InFlightRequest>>,
}

impl InFlightRegistry {
    /// Record `request` until the returned ticket is dropped.
    pub fn track(self: &Arc<Self>, request: InFlightRequest) -> InFlightTicket {
        let request_id = request.request_id;
        self.with_entries(|entries| {
            entries.insert(request_id, request);
        });

        InFlightTicket {
            registry: Arc::clone(self),
            request_id,
        }
    }

    pub fn len(&self) -> usize {
        self.with_entries(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<InFlightRequest> {
        self.with_entries(|entries| entries.values().cloned().collect())
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<Uuid, InFlightRequest>) -> R) -> R {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("In-flight registry lock poisoned, recovering");
            poisoned.into_inner()
        });
        f(&mut entries)
    }
}

/// Removes its record on drop, whichever way the invocation ends.
#[derive(Debug)]
pub struct InFlightTicket {
    registry: Arc<InFlightRegistry>,
    request_id: Uuid,
}

impl InFlightTicket {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let request_id = self.request_id;
        self.registry.with_entries(|entries| {
            entries.remove(&request_id);
        });
    }
}
