// src/config/mod.rs

//! Configuration loading and validation for assetpipe.
//!
//! Responsibilities:
//! - Define the TOML-backed pipeline model (`model.rs`).
//! - Load a config file from disk, or the built-in preset (`loader.rs`,
//!   `preset.rs`).
//! - Validate references, patterns and graph acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod preset;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str, load_or_preset};
pub use model::{
    BundleStep, CleanStep, CommandStep, ConfigFile, ConfigSection, CopyStep, InjectStep,
    InjectTarget, InlineImagesStep, LintStep, RawConfigFile, ServerConfig, SizeReportStep,
    StepConfig, TaskConfig, WatchRuleConfig,
};
pub use validate::validate_config;
