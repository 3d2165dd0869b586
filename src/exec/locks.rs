// src/exec/locks.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per top-level output directory.
///
/// Steps writing into the same tree (`dist` and `dist/images`) run one after
/// the other even when their tasks run in parallel. Locks are always taken
/// in sorted order.
#[derive(Debug, Default)]
pub struct OutputLocks {
    dirs: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl OutputLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every directory in `dirs`, held until the guards drop.
    pub async fn acquire(&self, dirs: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<String> = dirs.iter().map(|d| lock_key(d)).collect();
        sorted.sort();
        sorted.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut map = self.dirs.lock().unwrap_or_else(|e| e.into_inner());
            sorted
                .into_iter()
                .map(|dir| map.entry(dir).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        guards
    }
}

/// First path component of `dir`, or `.` for the project root.
fn lock_key(dir: &str) -> String {
    dir.split('/')
        .find(|seg| !seg.is_empty() && *seg != ".")
        .unwrap_or(".")
        .to_string()
}
