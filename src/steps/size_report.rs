// src/steps/size_report.rs

use std::fmt;
use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::warn;

use crate::config::model::SizeReportStep;
use crate::errors::{PipelineError, Result};
use crate::steps::StepContext;

/// Combined size of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeReport {
    pub title: String,
    pub files: usize,
    pub bytes: u64,
    /// Sum of the files' gzipped sizes, when requested.
    pub gzip_bytes: Option<u64>,
}

impl fmt::Display for SizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} all files {} ({} files)",
            self.title,
            human_size(self.bytes),
            self.files
        )?;
        if let Some(gz) = self.gzip_bytes {
            write!(f, ", {} gzipped", human_size(gz))?;
        }
        Ok(())
    }
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["kB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{value:.2} {unit}")
}

pub fn run(ctx: &StepContext, cfg: &SizeReportStep) -> Result<SizeReport> {
    let dir = ctx.path(&cfg.dir);
    let title = cfg.title.clone().unwrap_or_else(|| cfg.dir.clone());

    if !ctx.fs.is_dir(&dir) {
        warn!(dir = %cfg.dir, "size report directory does not exist");
        return Ok(SizeReport {
            title,
            files: 0,
            bytes: 0,
            gzip_bytes: cfg.gzip.then_some(0),
        });
    }

    let files = ctx
        .fs
        .walk_files(&dir)
        .map_err(|e| PipelineError::filesystem(&dir, e))?;
    let mut bytes = 0;
    let mut gzip_bytes = cfg.gzip.then_some(0);
    for file in files.iter() {
        bytes += ctx
            .fs
            .file_size(file)
            .map_err(|e| PipelineError::filesystem(file, e))?;
        if let Some(total) = gzip_bytes.as_mut() {
            let contents = ctx
                .fs
                .read(file)
                .map_err(|e| PipelineError::filesystem(file, e))?;
            *total += gzipped_len(&contents)?;
        }
    }

    Ok(SizeReport {
        title,
        files: files.len(),
        bytes,
        gzip_bytes,
    })
}

/// Size of `contents` after gzip at the highest compression level.
pub fn gzipped_len(contents: &[u8]) -> Result<u64> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(contents)?;
    let compressed = encoder.finish()?;
    Ok(compressed.len() as u64)
}
