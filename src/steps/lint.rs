// src/steps/lint.rs

//! `lint` step: run an external linter and report one line per violation.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::config::model::LintStep;
use crate::errors::{PipelineError, Result};
use crate::steps::StepContext;
use crate::steps::shell::{quote, render, run_shell};
use crate::steps::sources;

static VIOLATION_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(?P<file>[^:\s][^:]*):(?P<line>\d+):(?P<col>\d+):\s*(?P<message>.+)$"));

/// A single diagnostic reported by the linter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

/// Parse linter output in the `file:line:col: message` format. Lines that
/// don't look like a violation (summaries, blank lines) are skipped.
pub fn parse_violations(output: &str) -> Vec<Violation> {
    let Ok(re) = VIOLATION_RE.as_ref() else {
        return Vec::new();
    };
    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line.trim_end())?;
            Some(Violation {
                file: caps["file"].to_string(),
                line: caps["line"].parse().ok()?,
                column: caps["col"].parse().ok()?,
                message: caps["message"].trim().to_string(),
            })
        })
        .collect()
}

/// Lint the matched files. Returns the violations found.
///
/// Violations are always printed. They fail the step only when the linter
/// exits non-zero (errors, not just warnings) and no dev server is active.
pub async fn run(ctx: &StepContext, cfg: &LintStep) -> Result<Vec<Violation>> {
    let files = sources::resolve(
        ctx.fs.as_ref(),
        &ctx.root,
        &cfg.src,
        &cfg.exclude,
        None,
        false,
    )?;
    if files.is_empty() {
        info!(src = ?cfg.src, "no files to lint");
        return Ok(Vec::new());
    }

    let inputs = files
        .iter()
        .map(|f| quote(&f.rel))
        .collect::<Vec<_>>()
        .join(" ");
    let cmd = render(&cfg.cmd, &[("inputs", &inputs)]);
    let output = run_shell(&ctx.root, &cmd).await?;

    let violations = parse_violations(&output.stdout);
    for violation in violations.iter() {
        println!("{violation}");
    }

    if violations.is_empty() {
        if output.success() {
            info!(files = files.len(), "lint passed");
            return Ok(violations);
        }
        // The linter itself broke (bad config, missing binary).
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            eprintln!("{line}");
        }
        return Err(PipelineError::ToolFailed {
            step: "lint".to_string(),
            command: cmd,
            code: output.code,
        });
    }

    if output.success() {
        // Warnings only; the linter decides what counts as an error.
        warn!(
            violations = violations.len(),
            "lint reported warnings"
        );
        return Ok(violations);
    }

    if ctx.server_active {
        warn!(
            violations = violations.len(),
            "lint violations reported; not failing while serving"
        );
        return Ok(violations);
    }

    Err(PipelineError::Lint {
        violations: violations.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_formatter_output() {
        let out = "app/scripts/main.js:3:7: 'x' is defined but never used. [Error/no-unused-vars]\n\
                   app/scripts/main.js:10:1: Missing semicolon. [Warning/semi]\n\
                   \n\
                   2 problems\n";
        let violations = parse_violations(out);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].file, "app/scripts/main.js");
        assert_eq!(violations[0].line, 3);
        assert_eq!(violations[0].column, 7);
        assert_eq!(violations[1].message, "Missing semicolon. [Warning/semi]");
        assert_eq!(
            violations[1].to_string(),
            "app/scripts/main.js:10:1: Missing semicolon. [Warning/semi]"
        );
    }

    #[test]
    fn ignores_summary_lines() {
        assert!(parse_violations("✖ 0 problems\nall good\n").is_empty());
    }
}
