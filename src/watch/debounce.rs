// src/watch/debounce.rs

use std::time::Duration;

use tokio::time::Instant;

use crate::watch::dispatch::WatchEvent;

/// Coalesces paths arriving within `window` of the first path of a batch.
///
/// Pure bookkeeping: the caller supplies the clock, which keeps this
/// testable without sleeping.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    batch: WatchEvent,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            batch: WatchEvent::default(),
            deadline: None,
        }
    }

    /// Add a changed path. The first path of a batch starts the window.
    pub fn push(&mut self, path: String, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
        self.batch.push(path);
    }

    /// When the pending batch is due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the batch if its window has elapsed at `now`.
    pub fn take_ready(&mut self, now: Instant) -> Option<WatchEvent> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(std::mem::take(&mut self.batch))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_within_window_form_one_batch() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.push("app/a.scss".into(), start);
        d.push("app/a.scss".into(), start + Duration::from_millis(30));
        d.push("app/b.scss".into(), start + Duration::from_millis(60));

        assert!(d.take_ready(start + Duration::from_millis(99)).is_none());
        let batch = d.take_ready(start + Duration::from_millis(100));
        assert_eq!(
            batch.map(|b| b.paths),
            Some(vec!["app/a.scss".to_string(), "app/b.scss".to_string()])
        );
        assert!(d.deadline().is_none());
    }
}
