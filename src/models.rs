//! Core data models used throughout Wortschatz.
//!
//! These types represent the stored words, the ephemeral candidate facts
//! produced by provider adapters, and the run-level bookkeeping records that
//! flow through the enrichment pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Part of speech of a lexical entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Verb,
    Noun,
    Adjective,
    Preposition,
    Adverb,
    Phrase,
    Other,
}

impl PartOfSpeech {
    /// Stable lower-case code used in the database, file names, and the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Preposition => "preposition",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Phrase => "phrase",
            PartOfSpeech::Other => "other",
        }
    }

    /// Parse a stored code; anything unrecognized maps to [`PartOfSpeech::Other`].
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "verb" => PartOfSpeech::Verb,
            "noun" | "substantiv" => PartOfSpeech::Noun,
            "adjective" | "adjektiv" => PartOfSpeech::Adjective,
            "preposition" | "praeposition" => PartOfSpeech::Preposition,
            "adverb" => PartOfSpeech::Adverb,
            "phrase" => PartOfSpeech::Phrase,
            _ => PartOfSpeech::Other,
        }
    }
}

/// One stored translation of a word, kept in the append-only
/// `translations[]` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub value: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// One stored example sentence pair, kept in the append-only `examples[]`
/// array. Either side may be missing for legacy or partial data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sentence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sentence: Option<String>,
    pub source: String,
}

impl Example {
    /// Both sentence sides present and non-blank.
    pub fn is_full_pair(&self) -> bool {
        fn filled(side: &Option<String>) -> bool {
            side.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        filled(&self.source_sentence) && filled(&self.target_sentence)
    }
}

/// The canonical record for one lemma/part-of-speech pair.
///
/// Owned by the SQLite store; mutated only by applying a computed
/// [`Patch`](crate::merge::Patch) inside one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub id: String,
    pub lemma: String,
    pub pos: PartOfSpeech,
    /// Human-readable part-of-speech label (e.g. "Substantiv").
    pub pos_label: Option<String>,
    /// Primary translation into the learner's target language.
    pub translation: Option<String>,
    pub example_source: Option<String>,
    pub example_target: Option<String>,
    // Verb morphology.
    pub past_tense: Option<String>,
    pub past_participle: Option<String>,
    pub perfect: Option<String>,
    // Noun morphology.
    pub gender: Option<String>,
    pub plural: Option<String>,
    // Adjective morphology.
    pub comparative: Option<String>,
    pub superlative: Option<String>,
    /// Governed grammatical cases (prepositions).
    pub cases: Vec<String>,
    /// Free-form usage tags and notes.
    pub tags: Vec<String>,
    pub translations: Vec<Translation>,
    pub examples: Vec<Example>,
    pub curated: bool,
    pub complete: bool,
    /// Sorted, comma-joined provider identifiers that contributed data.
    pub enriched_from: Option<String>,
    pub enriched_at: Option<DateTime<Utc>>,
    pub enriched_with: Option<String>,
}

// ============ Provider candidates (ephemeral) ============

/// A translation candidate as returned by a provider adapter, before the
/// collector stamps the provider id onto it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateTranslation {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// An example sentence pair candidate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateExample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sentence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sentence: Option<String>,
}

/// A raw inflected form with its grammatical tags (e.g. "plural",
/// "nominative"), as providers report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedForm {
    pub form: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Verb-form candidates from one provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VerbForms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past_tense: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past_participle: Option<String>,
    /// Perfect-tense options; more than one means the provider could not
    /// disambiguate the auxiliary.
    #[serde(default)]
    pub perfect_options: Vec<String>,
    /// Auxiliary hints ("haben" / "sein"), possibly both.
    #[serde(default)]
    pub auxiliaries: Vec<String>,
    /// Directly supplied auxiliary string, used as a fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<String>,
}

impl VerbForms {
    /// Whether this payload offers anything a verb merge could use.
    pub fn has_any(&self) -> bool {
        self.past_tense.is_some()
            || self.past_participle.is_some()
            || !self.perfect_options.is_empty()
            || !self.auxiliaries.is_empty()
            || self.auxiliary.is_some()
    }
}

/// Noun-form candidates from one provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NounForms {
    /// Explicit gender hints (articles or gender names).
    #[serde(default)]
    pub genders: Vec<String>,
    /// Explicit plural entries.
    #[serde(default)]
    pub plurals: Vec<String>,
    /// Raw inflected forms with tags; tags may carry gender or plural hints.
    #[serde(default)]
    pub forms: Vec<TaggedForm>,
}

/// Adjective-form candidates from one provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdjectiveForms {
    #[serde(default)]
    pub comparatives: Vec<String>,
    #[serde(default)]
    pub superlatives: Vec<String>,
    #[serde(default)]
    pub forms: Vec<TaggedForm>,
}

/// Preposition attributes from one provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrepositionForms {
    /// Governed grammatical cases (e.g. "accusative", "dative").
    #[serde(default)]
    pub cases: Vec<String>,
}

/// Part-of-speech-specific form payload. Dispatch is an exhaustive match;
/// a payload whose variant does not match the word's part of speech is
/// ignored by the merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FormsPayload {
    Verb(VerbForms),
    Noun(NounForms),
    Adjective(AdjectiveForms),
    Preposition(PrepositionForms),
}

/// Everything one provider returned for one lemma lookup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateBundle {
    #[serde(default)]
    pub translations: Vec<CandidateTranslation>,
    #[serde(default)]
    pub examples: Vec<CandidateExample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forms: Option<FormsPayload>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_label: Option<String>,
}

impl CandidateBundle {
    /// True when the bundle carries nothing usable.
    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
            && self.examples.is_empty()
            && self.forms.is_none()
            && self.tags.is_empty()
            && self.pos_label.is_none()
    }
}

// ============ Collector output ============

/// Outcome of one provider invocation for one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Ok,
    Error,
    Skipped,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Ok => "ok",
            ProviderStatus::Error => "error",
            ProviderStatus::Skipped => "skipped",
        }
    }
}

/// Per-provider diagnostic and payload handed to the snapshot recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDraft {
    pub id: String,
    pub label: String,
    pub status: ProviderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Normalized candidate collections, present on success with data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<CandidateBundle>,
    /// Raw provider payload, kept verbatim for snapshot history.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}

/// A form payload together with the provider that suggested it. The order of
/// these in a [`SuggestionBundle`] is provider precedence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSuggestion {
    pub source: String,
    pub payload: FormsPayload,
}

/// Attribute metadata (tags, part-of-speech label) from one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSuggestion {
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_label: Option<String>,
}

/// All candidates collected for one word across every enabled provider,
/// normalized and deduplicated, in provider precedence order.
#[derive(Debug, Clone, Default)]
pub struct SuggestionBundle {
    pub translations: Vec<Translation>,
    pub examples: Vec<Example>,
    pub forms: Vec<FormSuggestion>,
    pub attributes: Vec<AttributeSuggestion>,
    /// Sorted, lower-cased provider ids that contributed at least one
    /// candidate. Used for provenance.
    pub sources: Vec<String>,
}

// ============ Run bookkeeping ============

/// Pipeline execution mode. Preview computes patches and snapshots without
/// touching the word store or the provider files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Preview,
    Apply,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Preview => "preview",
            RunMode::Apply => "apply",
        }
    }
}

/// Word selection scope for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Curated,
    Uncurated,
}

impl Scope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Scope::All),
            "curated" => Some(Scope::Curated),
            "uncurated" => Some(Scope::Uncurated),
            _ => None,
        }
    }
}

/// Filters applied when selecting words for a run.
#[derive(Debug, Clone)]
pub struct WordFilter {
    pub scope: Scope,
    pub incomplete_only: bool,
    pub pos: Option<Vec<PartOfSpeech>>,
    pub limit: Option<i64>,
}

impl Default for WordFilter {
    fn default() -> Self {
        Self {
            scope: Scope::All,
            incomplete_only: false,
            pos: None,
            limit: None,
        }
    }
}

/// One persisted snapshot row (append-only).
#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub id: String,
    pub word_id: String,
    pub provider_id: String,
    pub status: String,
    pub error: Option<String>,
    pub payload_json: String,
    pub raw_json: Option<String>,
    pub collected_at: i64,
    pub trigger: String,
    pub mode: String,
    pub has_changes: bool,
}
