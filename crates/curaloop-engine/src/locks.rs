//! Per-session mutual exclusion.
//!
//! One async mutex per session id. Tokio mutexes hand out the lock in the
//! order `lock()` was called, so same-session requests run in arrival order
//! while different sessions never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// A session's mutex and how many callers hold or wait on it.
#[derive(Debug, Default)]
struct Slot {
    lock: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

type LockTable = Arc<Mutex<HashMap<Uuid, Slot>>>;

#[derive(Debug, Default)]
pub struct SessionLocks {
    table: LockTable,
}

/// Exclusive access to one session.
///
/// Registered before the wait starts, so dropping it at any point, whether
/// after the turn or while the owning future is cancelled mid-wait or
/// mid-turn, unlocks the session and removes the entry once it has no users.
#[derive(Debug)]
pub struct SessionGuard {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    table: LockTable,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.guard.take();
        if let Ok(mut table) = self.table.lock() {
            if let Some(slot) = table.get_mut(&self.id) {
                slot.users = slot.users.saturating_sub(1);
                if slot.users == 0 {
                    table.remove(&self.id);
                }
            }
        }
    }
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: Uuid) -> Result<SessionGuard> {
        let lock = {
            let mut table = self
                .table
                .lock()
                .map_err(|e| EngineError::Storage(format!("session lock table poisoned: {}", e)))?;
            let slot = table.entry(id).or_default();
            slot.users += 1;
            slot.lock.clone()
        };
        let mut session = SessionGuard {
            id,
            guard: None,
            table: self.table.clone(),
        };
        session.guard = Some(lock.lock_owned().await);
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
