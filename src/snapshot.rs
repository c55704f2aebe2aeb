//! Snapshot recorder.
//!
//! Appends one versioned snapshot row per `(word, provider)` draft, computes
//! a change flag against the most recent prior snapshot, and on apply runs
//! upserts the lemma's entry into the per-(pos, provider) file, followed by
//! a best-effort mirror upload.
//!
//! Change detection canonicalizes both payloads (every array sorted by a
//! deterministic key, object keys sorted) and deep-compares the canonical
//! forms together with status and error text, so providers that shuffle
//! array order do not produce phantom diffs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

use crate::mirror::MirrorSink;
use crate::models::{ProviderDraft, ProviderStatus, RunMode, SnapshotRow, Word};
use crate::provider_file::{self, FileEntry, CURRENT_SCHEMA_VERSION};
use crate::store;

/// Where and how one run records its snapshots.
pub struct RecordContext<'a> {
    pub pool: &'a SqlitePool,
    pub files_dir: &'a Path,
    pub mirror: &'a dyn MirrorSink,
    pub mode: RunMode,
    pub trigger: &'a str,
}

/// Per-provider outcome of recording one word's drafts.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub provider_id: String,
    pub has_changes: bool,
    /// Isolated provider-file write failure; the collected suggestions are
    /// still usable by the merge engine.
    pub file_error: Option<String>,
}

/// Record every draft that actually ran (skipped providers produce no
/// snapshot). Database failures propagate; file failures are isolated into
/// the outcome.
pub async fn record_drafts(
    ctx: &RecordContext<'_>,
    word: &Word,
    drafts: &[ProviderDraft],
    now: DateTime<Utc>,
) -> Result<Vec<RecordOutcome>> {
    let mut outcomes = Vec::new();

    for draft in drafts {
        if draft.status == ProviderStatus::Skipped {
            continue;
        }

        let payload = draft
            .bundle
            .as_ref()
            .map(|b| serde_json::to_value(b).unwrap_or(Value::Null))
            .unwrap_or(Value::Null);

        let previous = store::latest_snapshot(ctx.pool, &word.id, &draft.id).await?;
        let has_changes = payload_changed(
            draft.status.as_str(),
            draft.error.as_deref(),
            &payload,
            previous.as_ref(),
        );

        let row = SnapshotRow {
            id: Uuid::new_v4().to_string(),
            word_id: word.id.clone(),
            provider_id: draft.id.clone(),
            status: draft.status.as_str().to_string(),
            error: draft.error.clone(),
            payload_json: payload.to_string(),
            raw_json: (!draft.raw.is_null()).then(|| draft.raw.to_string()),
            collected_at: now.timestamp(),
            trigger: ctx.trigger.to_string(),
            mode: ctx.mode.as_str().to_string(),
            has_changes,
        };
        store::insert_snapshot(ctx.pool, &row).await?;

        let mut file_error = None;
        if ctx.mode == RunMode::Apply && draft.bundle.is_some() {
            if let Err(e) = persist_to_file(ctx, word, draft, now).await {
                eprintln!(
                    "Warning: provider file write failed for '{}': {}",
                    draft.id, e
                );
                file_error = Some(e.to_string());
            }
        }

        outcomes.push(RecordOutcome {
            provider_id: draft.id.clone(),
            has_changes,
            file_error,
        });
    }

    Ok(outcomes)
}

/// Load (and upgrade if behind), upsert this lemma, write back, mirror.
async fn persist_to_file(
    ctx: &RecordContext<'_>,
    word: &Word,
    draft: &ProviderDraft,
    now: DateTime<Utc>,
) -> Result<()> {
    let bundle = draft.bundle.clone().unwrap_or_default();

    let mut file = match provider_file::load(ctx.files_dir, word.pos, &draft.id)? {
        Some(existing) => provider_file::upgrade(existing, CURRENT_SCHEMA_VERSION, now),
        None => provider_file::ProviderFile::new(word.pos, &draft.id, Some(&draft.label), now),
    };

    let entry = FileEntry {
        lemma: word.lemma.clone(),
        status: draft.status.as_str().to_string(),
        error: draft.error.clone(),
        translations: bundle.translations,
        examples: bundle.examples,
        forms: bundle.forms,
        tags: bundle.tags,
        collected_at: now,
    };
    file.upsert_entry(&word.lemma, &entry, now)?;

    let (path, bytes) = provider_file::save(ctx.files_dir, &file)?;

    // Best-effort mirror; a failure must not invalidate the local write.
    let key = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if let Err(e) = ctx.mirror.put(&key, &bytes).await {
        eprintln!(
            "Warning: mirror upload to {} failed for '{}': {}",
            ctx.mirror.describe(),
            key,
            e
        );
    }

    Ok(())
}

/// Whether the new snapshot differs from the previous one, comparing
/// canonical payload forms plus status and error text. No previous snapshot
/// counts as changed.
pub fn payload_changed(
    status: &str,
    error: Option<&str>,
    payload: &Value,
    previous: Option<&SnapshotRow>,
) -> bool {
    let Some(prev) = previous else {
        return true;
    };
    let prev_payload: Value = serde_json::from_str(&prev.payload_json).unwrap_or(Value::Null);

    let new_form = comparable(status, error, payload);
    let prev_form = comparable(&prev.status, prev.error.as_deref(), &prev_payload);
    new_form != prev_form
}

fn comparable(status: &str, error: Option<&str>, payload: &Value) -> Value {
    canonicalize(&serde_json::json!({
        "status": status,
        "error": error,
        "payload": payload,
    }))
}

/// Recursively sort every array by the compact serialization of its
/// canonicalized elements. Object keys are already sorted by `serde_json`'s
/// map representation.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut canonical: Vec<Value> = items.iter().map(canonicalize).collect();
            canonical.sort_by_key(|v| v.to_string());
            Value::Array(canonical)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
