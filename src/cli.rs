// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `assetpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetpipe",
    version,
    about = "Build, serve and live-reload a front-end project from a task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run, together with its prerequisites.
    #[arg(value_name = "TASK", default_value = "default")]
    pub task: String,

    /// Path to the pipeline config (TOML). The built-in preset is used when
    /// the file does not exist.
    #[arg(long, value_name = "PATH", default_value = "Assetpipe.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print tasks and the resolved plan, but don't run
    /// anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print task names and exit.
    #[arg(long)]
    pub list: bool,

    /// Override the dev server port of a serving task.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_defaults_to_default() {
        let args = CliArgs::parse_from(["assetpipe"]);
        assert_eq!(args.task, "default");
        assert_eq!(args.config, "Assetpipe.toml");
        assert!(args.port.is_none());
    }

    #[test]
    fn parses_task_and_flags() {
        let args = CliArgs::parse_from([
            "assetpipe",
            "serve:dist",
            "--port",
            "3000",
            "--log-level",
            "debug",
            "--dry-run",
        ]);
        assert_eq!(args.task, "serve:dist");
        assert_eq!(args.port, Some(3000));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(args.dry_run);
    }
}
