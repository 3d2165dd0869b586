// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::watch::debounce::Debouncer;
use crate::watch::dispatch::dispatch;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchRule;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send one `RuntimeEvent::WatchReaction` per
/// matching rule for every debounced batch of changes.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    rules: Vec<WatchRule>,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("assetpipe: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("assetpipe: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = %root.display(), rules = rules.len(), "file watcher started");

    tokio::spawn(async move {
        let mut debouncer = Debouncer::new(debounce);

        loop {
            let deadline = debouncer.deadline();
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    if matches!(event.kind, EventKind::Access(_)) {
                        continue;
                    }
                    debug!(?event, "received notify event");
                    let now = Instant::now();
                    for path in event.paths.iter() {
                        match relative_str(&root, path) {
                            Some(rel) => debouncer.push(rel, now),
                            None => warn!(?path, "could not relativize event path"),
                        }
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let Some(batch) = debouncer.take_ready(Instant::now()) else { continue };
                    debug!(paths = ?batch.paths, "debounced batch ready");

                    for reaction in dispatch(&rules, &batch) {
                        if runtime_tx.send(RuntimeEvent::WatchReaction(reaction)).await.is_err() {
                            debug!("runtime gone; stopping watcher loop");
                            return;
                        }
                    }
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
