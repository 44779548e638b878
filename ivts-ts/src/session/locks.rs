//! Per-interview write serialization
//!
//! Submissions for the same interview run one at a time; different
//! interviews never contend. Entries are removed once nobody holds or waits
//! for them, so the map only grows with concurrently active interviews.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
pub struct InterviewLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl InterviewLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until this task is the only writer for `interview_id`
    pub async fn acquire(&self, interview_id: &str) -> InterviewGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(interview_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;

        InterviewGuard {
            locks: self.inner.clone(),
            interview_id: interview_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of interviews with a held or awaited lock
    pub fn active(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Held for the duration of one read-decide-write cycle
pub struct InterviewGuard {
    locks: Arc<Mutex<LockMap>>,
    interview_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InterviewGuard {
    fn drop(&mut self) {
        // Release first so the strong count below only sees the map and waiters
        self.guard.take();

        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = map.get(&self.interview_id) {
            if Arc::strong_count(entry) == 1 {
                map.remove(&self.interview_id);
            }
        }
    }
}
