use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

type Rows = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Named row locks shared by every unit of work opened on one store.
///
/// Rows are keyed by strings such as `loan:<uuid>`; the first acquirer creates the
/// entry and the last guard to leave removes it. Guards are owned, so a unit of
/// work can hold several across awaits.
#[derive(Default, Clone)]
pub struct LockTable {
    rows: Rows,
}

/// Exclusive hold on one row. Dropping it frees the row.
pub struct RowGuard {
    key: String,
    rows: Rows,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the row is free and takes it.
    pub async fn acquire(&self, key: &str) -> RowGuard {
        let row = self.row(key);
        let guard = row.lock_owned().await;
        self.guard(key, guard)
    }

    /// Takes the row only if nobody holds it.
    pub fn try_acquire(&self, key: &str) -> Option<RowGuard> {
        let row = self.row(key);
        match row.try_lock_owned() {
            Ok(guard) => Some(self.guard(key, guard)),
            Err(_) => {
                prune(&self.rows, key);
                None
            }
        }
    }

    /// Number of rows currently held or waited on.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn row(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(rows.entry(key.to_string()).or_default())
    }

    fn guard(&self, key: &str, guard: OwnedMutexGuard<()>) -> RowGuard {
        RowGuard {
            key: key.to_string(),
            rows: Arc::clone(&self.rows),
            guard: Some(guard),
        }
    }
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.rows, &self.key);
    }
}

/// Removes the entry for `key` once only the table itself references it.
///
/// Waiters clone the row under the same map lock, so a row with a waiter is kept.
fn prune(rows: &Rows, key: &str) {
    let mut rows = rows.lock().unwrap_or_else(PoisonError::into_inner);
    if rows.get(key).is_some_and(|row| Arc::strong_count(row) == 1) {
        rows.remove(key);
    }
}
