//! Pending request table
//!
//! Maps correlation ids to reply slots. Ids come from a monotonic counter and
//! are never reused for the lifetime of the table. Waiters are woken through a
//! shared `Notify` rather than polling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

/// Outcome delivered to a waiting caller
pub type ReplyOutcome = ExchangeResult<Value>;

enum Slot {
    Waiting,
    Filled(ReplyOutcome),
}

/// Correlation table shared by the request side and the receive loop
pub struct PendingRequests {
    next_id: AtomicU64,
    slots: Mutex<HashMap<u64, Slot>>,
    notify: Notify,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
            notify: Notify::new(),
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next id and open an unanswered slot for it
    pub fn register(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots().insert(id, Slot::Waiting);
        id
    }

    /// Fill the slot for `id`.
    ///
    /// Returns false when the id is unknown or already answered; a slot is
    /// resolved at most once.
    pub fn resolve(&self, id: u64, outcome: ReplyOutcome) -> bool {
        let filled = {
            let mut slots = self.slots();
            match slots.get_mut(&id) {
                Some(slot) if matches!(slot, Slot::Waiting) => {
                    *slot = Slot::Filled(outcome);
                    true
                }
                _ => false,
            }
        };
        if filled {
            self.notify.notify_waiters();
        }
        filled
    }

    /// Fail every unanswered slot, returning how many were failed
    pub fn fail_all(&self, error: impl Fn() -> ExchangeError) -> usize {
        let failed = {
            let mut slots = self.slots();
            let mut failed = 0;
            for slot in slots.values_mut() {
                if matches!(slot, Slot::Waiting) {
                    *slot = Slot::Filled(Err(error()));
                    failed += 1;
                }
            }
            failed
        };
        self.notify.notify_waiters();
        failed
    }

    /// Drop a slot without waiting for it
    pub fn cancel(&self, id: u64) {
        self.slots().remove(&id);
    }

    /// Number of slots currently held (answered or not)
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the outcome for `id` if it has been answered.
    ///
    /// `Err` means the id has no slot at all.
    fn take(&self, id: u64) -> Result<Option<ReplyOutcome>, ()> {
        let mut slots = self.slots();
        let answered = match slots.get(&id) {
            None => return Err(()),
            Some(Slot::Waiting) => false,
            Some(Slot::Filled(_)) => true,
        };
        if !answered {
            return Ok(None);
        }
        match slots.remove(&id) {
            Some(Slot::Filled(outcome)) => Ok(Some(outcome)),
            _ => Err(()),
        }
    }

    /// Suspend until the slot for `id` is filled, then remove and return it
    pub async fn wait(&self, id: u64, timeout: Duration) -> ReplyOutcome {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking so a fill in between is not missed
            notified.as_mut().enable();

            match self.take(id) {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => {}
                Err(()) => {
                    return Err(ExchangeError::InvalidResponse(format!(
                        "no pending request with id {}",
                        id
                    )))
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                if let Ok(Some(outcome)) = self.take(id) {
                    return outcome;
                }
                self.cancel(id);
                return Err(ExchangeError::NetworkTimeout(timeout.as_millis() as u64));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_monotonic() {
        let table = PendingRequests::new();
        let a = table.register();
        let b = table.register();
        let c = table.register();
        assert!(a < b && b < c);
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn test_reply_is_returned_and_slot_removed() {
        let table = Arc::new(PendingRequests::new());
        let id = table.register();

        let resolver = Arc::clone(&table);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            resolver.resolve(id, Ok(json!({"ok": true})));
        });

        let reply = table.wait(id, Duration::from_secs(2)).await.unwrap();
        assert_eq!(reply, json!({"ok": true}));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_reply_already_filled_before_wait() {
        let table = PendingRequests::new();
        let id = table.register();
        assert!(table.resolve(id, Ok(json!(7))));

        let reply = table.wait(id, Duration::from_millis(50)).await.unwrap();
        assert_eq!(reply, json!(7));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_slot_resolves_at_most_once() {
        let table = PendingRequests::new();
        let id = table.register();
        assert!(table.resolve(id, Ok(json!(1))));
        assert!(!table.resolve(id, Ok(json!(2))));

        let reply = table.wait(id, Duration::from_millis(50)).await.unwrap();
        assert_eq!(reply, json!(1));
    }

    #[tokio::test]
    async fn test_timeout_removes_slot() {
        let table = PendingRequests::new();
        let id = table.register();

        let err = table.wait(id, Duration::from_millis(30)).await.unwrap_err();
        assert!(matches!(err, ExchangeError::NetworkTimeout(30)));
        assert!(table.is_empty());
        assert!(!table.resolve(id, Ok(json!(null))));
    }

    #[tokio::test]
    async fn test_fail_all_wakes_waiters_with_connection_lost() {
        let table = Arc::new(PendingRequests::new());
        let first = table.register();
        let second = table.register();

        let closer = Arc::clone(&table);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(closer.fail_all(|| ExchangeError::ConnectionLost), 2);
        });

        let a = table.wait(first, Duration::from_secs(2)).await;
        let b = table.wait(second, Duration::from_secs(2)).await;
        assert!(matches!(a, Err(ExchangeError::ConnectionLost)));
        assert!(matches!(b, Err(ExchangeError::ConnectionLost)));
    }

    #[tokio::test]
    async fn test_wait_on_unknown_id() {
        let table = PendingRequests::new();
        let err = table.wait(99, Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidResponse(_)));
    }
}
