//! Enrichment pipeline orchestration.
//!
//! Selects target words, then runs collector → snapshot recorder →
//! merge/patch engine per word, strictly one word at a time. Apply mode
//! backs up every selected row first and commits each word's patch in its
//! own transaction; preview mode computes everything but writes neither
//! words nor provider files.
//!
//! A provider failure is contained within its word. A database or
//! transaction failure halts the run at that word (earlier commits stay)
//! and the report still covers everything processed up to that point.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;

use crate::collect;
use crate::config::Config;
use crate::merge::{self, MergeOptions};
use crate::mirror::MirrorSink;
use crate::models::{ProviderStatus, RunMode, Scope, Word, WordFilter};
use crate::providers::ProviderRegistry;
use crate::report::{
    Diagnostic, EntrySummary, ReportConfig, RunReport, Totals,
};
use crate::snapshot::{self, RecordContext};
use crate::store;

/// Options for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    /// What started the run (e.g. "manual", "scheduled").
    pub trigger: String,
    pub filter: WordFilter,
    pub allow_overwrite: bool,
}

/// Result of a completed run.
pub struct RunOutcome {
    pub report: RunReport,
    pub report_path: PathBuf,
    pub backup_path: Option<PathBuf>,
}

pub async fn run(
    config: &Config,
    pool: &SqlitePool,
    registry: &ProviderRegistry,
    mirror: &dyn MirrorSink,
    opts: &RunOptions,
) -> Result<RunOutcome> {
    let words = store::select_words(pool, &opts.filter).await?;

    let mut backup_path = None;
    if opts.mode == RunMode::Apply && !words.is_empty() {
        let path = crate::report::write_backup(&config.run.backup_dir, &words, Utc::now())?;
        println!("backup written: {}", path.display());
        backup_path = Some(path);
    }

    let record_ctx = RecordContext {
        pool,
        files_dir: &config.files.dir,
        mirror,
        mode: opts.mode,
        trigger: &opts.trigger,
    };
    let merge_opts = MergeOptions {
        allow_overwrite: opts.allow_overwrite,
        target_lang: config.run.target_lang.clone(),
    };

    let mut totals = Totals {
        scanned: words.len() as u64,
        ..Default::default()
    };
    let mut entries = Vec::new();

    for (index, word) in words.iter().enumerate() {
        if index > 0 && config.run.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.run.delay_ms)).await;
        }

        match process_word(&record_ctx, registry, &merge_opts, opts, word).await {
            Ok(summary) => {
                if !summary.changed_fields.is_empty() {
                    totals.proposed_updates += 1;
                }
                if summary.applied {
                    totals.applied += 1;
                }
                entries.push(summary);
            }
            Err(e) => {
                // Engine-scoped failure: report what ran, then propagate.
                let report = build_report(config, registry, opts, totals, entries);
                let report_path = crate::report::write_report(&config.run.report_dir, &report)?;
                return Err(e).with_context(|| {
                    format!(
                        "Run halted at '{}'; partial report: {}",
                        word.lemma,
                        report_path.display()
                    )
                });
            }
        }
    }

    let report = build_report(config, registry, opts, totals, entries);
    let report_path = crate::report::write_report(&config.run.report_dir, &report)?;

    println!("enrich ({})", opts.mode.as_str());
    println!("  scanned: {}", report.totals.scanned);
    println!("  proposed updates: {}", report.totals.proposed_updates);
    println!("  applied: {}", report.totals.applied);
    println!("  report: {}", report_path.display());
    println!("ok");

    Ok(RunOutcome {
        report,
        report_path,
        backup_path,
    })
}

/// Collector → recorder → merge → (apply) for one word.
async fn process_word(
    record_ctx: &RecordContext<'_>,
    registry: &ProviderRegistry,
    merge_opts: &MergeOptions,
    opts: &RunOptions,
    word: &Word,
) -> Result<EntrySummary> {
    let now = Utc::now();
    let collected = collect::collect_suggestions(registry, word).await;

    // Database failures here propagate and halt the run at this word.
    let outcomes = snapshot::record_drafts(record_ctx, word, &collected.drafts, now).await?;

    let mut errors = Vec::new();
    for draft in &collected.drafts {
        if draft.status == ProviderStatus::Error {
            if let Some(ref message) = draft.error {
                errors.push(format!("{}: {}", draft.id, message));
            }
        }
    }
    for outcome in &outcomes {
        if let Some(ref message) = outcome.file_error {
            errors.push(format!("{} (file): {}", outcome.provider_id, message));
        }
    }

    let mut patch = merge::build_patch(word, &collected.bundle, merge_opts);
    let mut applied = false;

    if opts.mode == RunMode::Apply && !patch.is_empty() {
        // Stamp the enrichment metadata; the stamps are reported as
        // additional field changes.
        patch.set("enriched_at", Value::String(now.to_rfc3339()));
        patch.set(
            "enriched_with",
            Value::String(format!("enrich:{}", opts.trigger)),
        );
        store::apply_patch(record_ctx.pool, &word.id, &patch).await?;
        applied = true;
    }

    let diagnostics = collected
        .drafts
        .iter()
        .map(|draft| Diagnostic {
            id: draft.id.clone(),
            label: draft.label.clone(),
            status: draft.status,
            error: draft.error.clone(),
            has_changes: outcomes
                .iter()
                .find(|o| o.provider_id == draft.id)
                .map(|o| o.has_changes)
                .unwrap_or(false),
        })
        .collect();

    Ok(EntrySummary {
        word_id: word.id.clone(),
        lemma: word.lemma.clone(),
        pos: word.pos.code().to_string(),
        changed_fields: patch.fields(),
        patch,
        applied,
        diagnostics,
        errors,
    })
}

fn build_report(
    config: &Config,
    registry: &ProviderRegistry,
    opts: &RunOptions,
    totals: Totals,
    entries: Vec<EntrySummary>,
) -> RunReport {
    let scope = match opts.filter.scope {
        Scope::All => "all",
        Scope::Curated => "curated",
        Scope::Uncurated => "uncurated",
    };
    RunReport {
        generated_at: Utc::now(),
        config: ReportConfig {
            mode: opts.mode.as_str().to_string(),
            trigger: opts.trigger.clone(),
            scope: scope.to_string(),
            incomplete_only: opts.filter.incomplete_only,
            pos: opts
                .filter
                .pos
                .as_ref()
                .map(|list| list.iter().map(|p| p.code().to_string()).collect()),
            limit: opts.filter.limit,
            allow_overwrite: opts.allow_overwrite,
            target_lang: config.run.target_lang.clone(),
            providers: registry.iter().map(|p| p.id().to_string()).collect(),
        },
        totals,
        entries,
    }
}
