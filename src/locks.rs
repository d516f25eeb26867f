//! Per-output serialization of report generation.

use crate::error::{ReportError, ReportResult};
use crate::model::ReportKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Requests sharing a key target the same output document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub ship_id: String,
    pub kind: ReportKind,
}

impl LockKey {
    pub fn new(ship_id: impl Into<String>, kind: ReportKind) -> Self {
        Self {
            ship_id: ship_id.into(),
            kind,
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ship_id, self.kind)
    }
}

/// One single-permit semaphore per key. Distinct keys never contend.
#[derive(Debug, Default)]
pub struct ReportLocks {
    slots: Mutex<HashMap<LockKey, Arc<Semaphore>>>,
}

/// Held for the whole read-modify-persist cycle; released on drop.
#[derive(Debug)]
pub struct ReportLockGuard {
    key: LockKey,
    _permit: OwnedSemaphorePermit,
}

impl ReportLockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }
}

impl ReportLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &LockKey) -> Arc<Semaphore> {
        self.slots
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Waits up to `timeout` for exclusive access to `key`.
    pub async fn acquire(&self, key: LockKey, timeout: Duration) -> ReportResult<ReportLockGuard> {
        let started = Instant::now();
        let semaphore = self.slot(&key);
        let permit = match tokio::time::timeout(timeout, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(ReportError::Task(format!("lock for {key} was closed")));
            }
            Err(_) => {
                tracing::warn!(key = %key, timeout_ms = timeout.as_millis() as u64, "report lock busy");
                return Err(ReportError::Busy {
                    key: key.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        };
        tracing::debug!(
            key = %key,
            waited_ms = started.elapsed().as_millis() as u64,
            "report lock acquired"
        );
        Ok(ReportLockGuard {
            key,
            _permit: permit,
        })
    }

    pub fn tracked_keys(&self) -> usize {
        self.slots.lock().len()
    }
}
