//! Run reports and apply backups.
//!
//! A report is written for every run, preview or apply; the backup is
//! written on apply runs before any patch is committed. All timestamps are
//! RFC 3339.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::merge::Patch;
use crate::models::{ProviderStatus, Word};

/// Configuration echo included in the report for reproducibility.
#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub mode: String,
    pub trigger: String,
    pub scope: String,
    pub incomplete_only: bool,
    pub pos: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub allow_overwrite: bool,
    pub target_lang: String,
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    pub scanned: u64,
    pub proposed_updates: u64,
    pub applied: u64,
}

/// One provider diagnostic in the report.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub id: String,
    pub label: String,
    pub status: ProviderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub has_changes: bool,
}

/// Per-word summary: what was proposed, what was applied, what went wrong.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub word_id: String,
    pub lemma: String,
    pub pos: String,
    pub changed_fields: Vec<String>,
    pub patch: Patch,
    pub applied: bool,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub config: ReportConfig,
    pub totals: Totals,
    pub entries: Vec<EntrySummary>,
}

/// Write the report as `report-<timestamp>.json`; returns the path.
pub fn write_report(dir: &Path, report: &RunReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "report-{}.json",
        report.generated_at.format("%Y%m%dT%H%M%SZ")
    ));
    let bytes = serde_json::to_vec_pretty(report)?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(path)
}

#[derive(Debug, Clone, Serialize)]
struct Backup<'a> {
    created_at: DateTime<Utc>,
    count: usize,
    entries: &'a [Word],
}

/// Write a full backup of the selected rows before applying any patch.
pub fn write_backup(dir: &Path, words: &[Word], now: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("backup-{}.json", now.format("%Y%m%dT%H%M%SZ")));
    let backup = Backup {
        created_at: now,
        count: words.len(),
        entries: words,
    };
    let bytes = serde_json::to_vec_pretty(&backup)?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write backup: {}", path.display()))?;
    Ok(path)
}
