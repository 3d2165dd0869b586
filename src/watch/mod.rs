// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling watch rule glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Debouncing bursts of changes into batches.
//! - Turning each batch into [`Reaction`]s with the pure [`dispatch`].
//!
//! It does not know about the task graph; reactions are interpreted by the
//! engine.

pub mod debounce;
pub mod dispatch;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::Debouncer;
pub use dispatch::{Reaction, WatchEvent, dispatch};
pub use patterns::{WatchRule, compile_rules};
pub use watcher::{WatcherHandle, spawn_watcher};
