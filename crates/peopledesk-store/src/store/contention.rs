//! Contention between sessions on the same store.
//!
//! Every live [`Database`](super::Database) registers a slot under its
//! store key. A session that needs the store to itself (to upgrade the
//! schema or delete the files) signals [`ConnectionEvent::Blocking`] to
//! every other holder, reports [`ConnectionEvent::Blocked`] to its own
//! subscribers, and waits until the holders release or the blocked timeout
//! passes. Neither signal is an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::database::DatabaseInner;
use crate::errors::{Result, StoreError};

/// Lifecycle signal delivered to [`ConnectionManager::subscribe`](super::ConnectionManager::subscribe) receivers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConnectionEvent {
    /// This session is waiting on other sessions (or another process) to
    /// release the store.
    Blocked {
        /// Version the holders have open.
        current_version: u32,
        /// Version being opened; `None` for a delete.
        requested_version: Option<u32>,
        /// Live sessions being waited on (0 when the wait is on a lock held
        /// by another process).
        holders: usize,
    },
    /// This session's handle is holding up another session.
    Blocking {
        /// Version this session has open.
        current_version: u32,
        /// Version the other session wants; `None` for a delete.
        requested_version: Option<u32>,
    },
    /// The schema was migrated on open.
    Upgraded {
        /// Version before.
        from: u32,
        /// Version after.
        to: u32,
    },
    /// The live handle was closed.
    Closed,
}

struct Slot {
    id: u64,
    version: u32,
    events: broadcast::Sender<ConnectionEvent>,
    yield_on_version_change: bool,
    handle: Weak<DatabaseInner>,
}

struct RegistryInner {
    slots: Mutex<HashMap<String, Vec<Slot>>>,
    released: watch::Sender<u64>,
    next_id: AtomicU64,
}

/// Live sessions per store key. Share one registry between managers that
/// should see each other.
#[derive(Clone)]
pub struct ContentionRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for ContentionRegistry {
    fn default() -> Self {
        let (released, _) = watch::channel(0);
        Self {
            inner: Arc::new(RegistryInner {
                slots: Mutex::new(HashMap::new()),
                released,
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl std::fmt::Debug for ContentionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.inner.slots.lock();
        f.debug_struct("ContentionRegistry")
            .field("stores", &slots.len())
            .finish()
    }
}

impl ContentionRegistry {
    /// New, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions on `key`.
    pub fn holders(&self, key: &str) -> usize {
        self.inner.slots.lock().get(key).map_or(0, Vec::len)
    }

    pub(crate) fn register(
        &self,
        key: &str,
        version: u32,
        events: broadcast::Sender<ConnectionEvent>,
        yield_on_version_change: bool,
        handle: Weak<DatabaseInner>,
    ) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .slots
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(Slot {
                id,
                version,
                events,
                yield_on_version_change,
                handle,
            });
        id
    }

    pub(crate) fn release(&self, key: &str, id: u64) {
        {
            let mut slots = self.inner.slots.lock();
            if let Some(list) = slots.get_mut(key) {
                list.retain(|slot| slot.id != id);
                if list.is_empty() {
                    let _ = slots.remove(key);
                }
            }
        }
        self.inner.released.send_modify(|generation| *generation += 1);
    }

    /// Wait until no session holds `key`.
    ///
    /// Holders receive [`ConnectionEvent::Blocking`]; those configured to
    /// yield are closed on the spot. If any remain, `own_events` receives
    /// [`ConnectionEvent::Blocked`]. Fails with a connection error once
    /// `timeout` elapses.
    pub(crate) async fn wait_for_release(
        &self,
        key: &str,
        requested_version: Option<u32>,
        own_events: &broadcast::Sender<ConnectionEvent>,
        timeout: Duration,
    ) -> Result<()> {
        let mut released = self.inner.released.subscribe();
        let deadline = Instant::now() + timeout;

        let (current_version, yielding) = {
            let slots = self.inner.slots.lock();
            let Some(list) = slots.get(key).filter(|list| !list.is_empty()) else {
                return Ok(());
            };
            let current_version = list.iter().map(|slot| slot.version).max().unwrap_or(0);
            let mut yielding = Vec::new();
            for slot in list {
                let _ = slot.events.send(ConnectionEvent::Blocking {
                    current_version: slot.version,
                    requested_version,
                });
                if slot.yield_on_version_change {
                    yielding.push(slot.handle.clone());
                }
            }
            (current_version, yielding)
        };

        for handle in yielding {
            if let Some(inner) = handle.upgrade() {
                debug!(store = key, "closing handle that yields on version change");
                let _ = inner.close();
            }
        }

        let holders = self.holders(key);
        if holders == 0 {
            return Ok(());
        }
        warn!(
            store = key,
            current_version,
            requested_version,
            holders,
            "blocked by other open sessions"
        );
        let _ = own_events.send(ConnectionEvent::Blocked {
            current_version,
            requested_version,
            holders,
        });

        loop {
            if self.holders(key) == 0 {
                return Ok(());
            }
            match tokio::time::timeout_at(deadline, released.changed()).await {
                Ok(_) => {}
                Err(_) => {
                    let holders = self.holders(key);
                    warn!(store = key, holders, "gave up waiting for other sessions");
                    return Err(StoreError::connection(
                        format!(
                            "store '{key}' is still held by {holders} other session(s) after {}ms",
                            timeout.as_millis()
                        ),
                        None,
                    ));
                }
            }
        }
    }
}
