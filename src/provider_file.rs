//! Versioned per-(part-of-speech, provider) snapshot files.
//!
//! One JSON document per `(pos, provider)` pair holds the latest successful
//! lookup per lemma, so apply runs can be diffed and re-imported without the
//! database. The document carries a `schemaVersion`; loading an old file
//! upgrades it in place through [`upgrade`], a pure function that reshapes
//! only legacy-shaped fields and leaves every other lemma's entry untouched.
//!
//! Single-writer assumption: two pipeline runs against the same files
//! directory can race on these read-modify-write cycles. This is documented,
//! not enforced; the pipeline is a manually triggered batch job.
//!
//! Legacy shapes:
//! - v0: an entry is a bare array of translation strings.
//! - v1: an entry object whose `translations` are plain strings.
//! - v2 (current): translations are `{value, source, ...}` objects.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::{CandidateExample, CandidateTranslation, FormsPayload, PartOfSpeech};
use crate::normalize::fold;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFile {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_label: Option<String>,
    #[serde(default)]
    pub pos: String,
    pub updated_at: DateTime<Utc>,
    /// Lemma key (folded lemma) to entry. Entries stay as raw JSON so that
    /// the upgrade can reshape legacy forms without round-tripping them
    /// through the current types.
    #[serde(default)]
    pub entries: BTreeMap<String, Value>,
    #[serde(default)]
    pub meta: FileMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upgraded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_schema_versions: Vec<u32>,
}

/// Current-shape entry for one lemma.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub lemma: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub translations: Vec<CandidateTranslation>,
    #[serde(default)]
    pub examples: Vec<CandidateExample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forms: Option<FormsPayload>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub collected_at: DateTime<Utc>,
}

impl ProviderFile {
    pub fn new(
        pos: PartOfSpeech,
        provider_id: &str,
        provider_label: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            provider_id: provider_id.to_string(),
            provider_label: provider_label.map(str::to_string),
            pos: pos.code().to_string(),
            updated_at: now,
            entries: BTreeMap::new(),
            meta: FileMeta {
                created_at: Some(now),
                ..Default::default()
            },
        }
    }

    /// Insert or replace this lemma's entry; other lemmas are untouched.
    pub fn upsert_entry(&mut self, lemma: &str, entry: &FileEntry, now: DateTime<Utc>) -> Result<()> {
        let value = serde_json::to_value(entry)?;
        self.entries.insert(fold(lemma), value);
        self.updated_at = now;
        Ok(())
    }
}

/// File name for one `(pos, provider)` pair.
pub fn file_name(pos: PartOfSpeech, provider_id: &str) -> String {
    format!("{}-{}.json", pos.code(), fold(provider_id))
}

/// Load a provider file if it exists. No upgrade is performed here; callers
/// pass the result through [`upgrade`].
pub fn load(dir: &Path, pos: PartOfSpeech, provider_id: &str) -> Result<Option<ProviderFile>> {
    let path = dir.join(file_name(pos, provider_id));
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read provider file: {}", path.display()))?;
    let file = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse provider file: {}", path.display()))?;
    Ok(Some(file))
}

/// Serialize and write the file; returns the path and the written bytes
/// (the same bytes a mirror sink receives).
pub fn save(dir: &Path, file: &ProviderFile) -> Result<(PathBuf, Vec<u8>)> {
    std::fs::create_dir_all(dir)?;
    let pos = PartOfSpeech::from_code(&file.pos);
    let path = dir.join(file_name(pos, &file.provider_id));
    let bytes = serde_json::to_vec_pretty(file)?;
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write provider file: {}", path.display()))?;
    Ok((path, bytes))
}

/// Upgrade a file to `current`, one version step at a time. Pure: the
/// current version and the timestamp are explicit parameters. A file
/// already at or past `current` is returned unchanged; `schemaVersion`
/// never decreases.
pub fn upgrade(mut file: ProviderFile, current: u32, now: DateTime<Utc>) -> ProviderFile {
    if file.schema_version >= current {
        return file;
    }

    while file.schema_version < current {
        let old = file.schema_version;
        if !file.meta.previous_schema_versions.contains(&old) {
            file.meta.previous_schema_versions.push(old);
        }
        match old {
            0 => upgrade_v0_to_v1(&mut file),
            1 => upgrade_v1_to_v2(&mut file),
            // Unknown intermediate version: nothing to reshape.
            _ => {}
        }
        file.schema_version = old + 1;
    }
    file.meta.last_upgraded_at = Some(now);
    file
}

/// v0 → v1: bare translation-string arrays become entry objects.
fn upgrade_v0_to_v1(file: &mut ProviderFile) {
    for (key, entry) in file.entries.iter_mut() {
        if let Value::Array(values) = entry {
            let translations: Vec<Value> = values
                .iter()
                .filter(|v| v.is_string())
                .cloned()
                .collect();
            *entry = serde_json::json!({
                "lemma": key,
                "status": "ok",
                "translations": translations,
            });
        }
    }
}

/// v1 → v2: plain-string translations become `{value, source}` objects.
fn upgrade_v1_to_v2(file: &mut ProviderFile) {
    let provider_id = file.provider_id.clone();
    for entry in file.entries.values_mut() {
        let Some(translations) = entry.get_mut("translations").and_then(Value::as_array_mut)
        else {
            continue;
        };
        for item in translations.iter_mut() {
            if let Value::String(s) = item {
                *item = serde_json::json!({
                    "value": s,
                    "source": provider_id.as_str(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-08-28T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn legacy_v0_file() -> ProviderFile {
        let mut entries = BTreeMap::new();
        entries.insert(
            "apfel".to_string(),
            serde_json::json!(["apple", "pomace"]),
        );
        entries.insert(
            "birne".to_string(),
            serde_json::json!(["pear"]),
        );
        ProviderFile {
            schema_version: 0,
            provider_id: "dictfile".into(),
            provider_label: None,
            pos: "noun".into(),
            updated_at: now(),
            entries,
            meta: FileMeta::default(),
        }
    }

    #[test]
    fn upgrade_from_v0_records_history_and_reshapes() {
        let upgraded = upgrade(legacy_v0_file(), CURRENT_SCHEMA_VERSION, now());
        assert_eq!(upgraded.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(upgraded.meta.previous_schema_versions, vec![0, 1]);
        assert_eq!(upgraded.meta.last_upgraded_at, Some(now()));

        let apfel = &upgraded.entries["apfel"];
        assert_eq!(
            apfel["translations"][0],
            serde_json::json!({ "value": "apple", "source": "dictfile" })
        );
        assert_eq!(apfel["status"], "ok");
    }

    #[test]
    fn upgrade_preserves_other_lemmas() {
        let mut file = legacy_v0_file();
        // One lemma is already current-shaped; it must survive byte-for-byte.
        let modern = serde_json::json!({
            "lemma": "kirsche",
            "status": "ok",
            "translations": [{ "value": "cherry", "source": "dictfile" }],
            "collectedAt": "2026-08-27T00:00:00Z"
        });
        file.entries.insert("kirsche".into(), modern.clone());

        let upgraded = upgrade(file, CURRENT_SCHEMA_VERSION, now());
        assert_eq!(upgraded.entries["kirsche"], modern);
        assert!(upgraded.entries.contains_key("birne"));
    }

    #[test]
    fn upgrade_is_a_no_op_at_or_past_current() {
        let mut file = legacy_v0_file();
        file.schema_version = CURRENT_SCHEMA_VERSION;
        let upgraded = upgrade(file.clone(), CURRENT_SCHEMA_VERSION, now());
        assert_eq!(upgraded.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(upgraded.meta.previous_schema_versions.is_empty());
        assert!(upgraded.meta.last_upgraded_at.is_none());

        // Never downgrade.
        file.schema_version = CURRENT_SCHEMA_VERSION + 1;
        let upgraded = upgrade(file, CURRENT_SCHEMA_VERSION, now());
        assert_eq!(upgraded.schema_version, CURRENT_SCHEMA_VERSION + 1);
    }

    #[test]
    fn repeated_upgrades_do_not_duplicate_history() {
        let mut file = legacy_v0_file();
        file.meta.previous_schema_versions = vec![0];
        file.schema_version = 1;
        let upgraded = upgrade(file, CURRENT_SCHEMA_VERSION, now());
        assert_eq!(upgraded.meta.previous_schema_versions, vec![0, 1]);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ProviderFile::new(PartOfSpeech::Noun, "dictfile", Some("Dictionary"), now());
        let entry = FileEntry {
            lemma: "Apfel".into(),
            status: "ok".into(),
            error: None,
            translations: vec![CandidateTranslation {
                value: "apple".into(),
                language: Some("en".into()),
                confidence: None,
            }],
            examples: Vec::new(),
            forms: None,
            tags: Vec::new(),
            collected_at: now(),
        };
        file.upsert_entry("Apfel", &entry, now()).unwrap();

        save(dir.path(), &file).unwrap();
        let loaded = load(dir.path(), PartOfSpeech::Noun, "dictfile")
            .unwrap()
            .expect("file exists");
        assert_eq!(loaded.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(loaded.entries.contains_key("apfel"));
        assert_eq!(loaded.provider_label.as_deref(), Some("Dictionary"));
    }
}
