//! Report persistence.
//!
//! Each run is written as two sibling files, `<stem>.json` and `<stem>.txt`,
//! where the stem is `monitoring_report_{Company}_{tag}_{YYYYmmdd_HHMMSS}`.
//! Files are created with `create_new`; when a stem is taken a numeric
//! suffix is appended, so no run ever overwrites another.

use super::generator::{generate_json_report, generate_text_report};
use crate::models::MonitoringReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Give up looking for a free file name after this many suffixes.
const MAX_SUFFIX: u32 = 1000;

/// Paths of a persisted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub json_path: PathBuf,
    pub text_path: PathBuf,
}

/// Writes reports under one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    tag: String,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            tag: tag.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File stem for a company's report at `at`.
    pub fn file_stem(&self, company_name: &str, at: DateTime<Utc>) -> String {
        format!(
            "monitoring_report_{}_{}_{}",
            sanitize(company_name),
            sanitize(&self.tag),
            at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Persist `report` in both formats.
    pub fn write(&self, report: &MonitoringReport) -> Result<WrittenReport> {
        let json = generate_json_report(report)?;
        let text = generate_text_report(report, &self.tag);
        let stem = self.file_stem(&report.company_name, report.run_at);

        self.ensure_dir()?;

        for n in 0..MAX_SUFFIX {
            let candidate = with_suffix(&stem, n);
            let json_path = self.output_dir.join(format!("{}.json", candidate));
            let text_path = self.output_dir.join(format!("{}.txt", candidate));

            if !create_new(&json_path, json.as_bytes())? {
                continue;
            }
            if !create_new(&text_path, text.as_bytes())? {
                std::fs::remove_file(&json_path).ok();
                continue;
            }

            info!(
                "Report saved to {} and {}",
                json_path.display(),
                text_path.display()
            );
            return Ok(WrittenReport {
                json_path,
                text_path,
            });
        }

        anyhow::bail!("No free report file name for stem {}", stem)
    }

    /// Persist a batch summary as `batch_monitoring_report_{ts}.json`.
    pub fn write_batch_summary<T: Serialize>(
        &self,
        summary: &T,
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(summary).context("Failed to serialize batch summary")?;
        let stem = format!("batch_monitoring_report_{}", at.format("%Y%m%d_%H%M%S"));

        self.ensure_dir()?;

        for n in 0..MAX_SUFFIX {
            let path = self
                .output_dir
                .join(format!("{}.json", with_suffix(&stem, n)));
            if create_new(&path, json.as_bytes())? {
                info!("Batch summary saved to {}", path.display());
                return Ok(path);
            }
        }

        anyhow::bail!("No free batch report file name for stem {}", stem)
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output_dir.display()
            )
        })
    }
}

fn with_suffix(stem: &str, n: u32) -> String {
    if n == 0 {
        stem.to_string()
    } else {
        format!("{}_{}", stem, n)
    }
}

/// Write `content` to a new file; `Ok(false)` when the file already exists.
fn create_new(path: &Path, content: &[u8]) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("{} exists, trying next name", path.display());
            return Ok(false);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to create {}", path.display()));
        }
    };

    file.write_all(content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Company names become file-name safe: anything but letters and digits is `_`.
fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
