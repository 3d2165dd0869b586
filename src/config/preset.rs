// src/config/preset.rs

//! Built-in pipeline for the conventional `app/` + `test/` front-end layout.

/// TOML source of the preset pipeline.
pub const PRESET_TOML: &str = include_str!("preset.toml");
