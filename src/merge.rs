//! Merge/patch engine.
//!
//! Combines the collected suggestions with a word's stored state and
//! produces a minimal field-level patch. Pure: the patch is a function of
//! `(word, bundle, options)` only, so re-running against unchanged
//! suggestions yields an empty patch.
//!
//! Human-curated values are protected by the overwrite guard: a non-blank
//! scalar field is only replaced when `allow_overwrite` is set. Array fields
//! are union-merged and never lose stored entries.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::models::{Example, PartOfSpeech, SuggestionBundle, Translation, Word};
use crate::morphology;
use crate::normalize::{
    classifies_as_target, example_key, fold, is_blank, provenance_tokens, translation_key,
};

/// Options controlling a merge.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Replace non-blank stored scalars with candidate values.
    pub allow_overwrite: bool,
    /// Learner's language code; candidates are classified against it.
    pub target_lang: String,
}

/// The minimal set of field changes needed to incorporate the suggestions.
///
/// Keys are word field names; values are the new field contents. Applied at
/// most once, inside one transaction, by the store.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Patch {
    changes: BTreeMap<String, Value>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.changes.insert(field.to_string(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.changes.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Field names in deterministic (sorted) order.
    pub fn fields(&self) -> Vec<String> {
        self.changes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.changes.iter()
    }
}

/// Working copy of a word's mergeable fields. Mutated by the policies
/// below, then diffed against the stored word to emit the patch.
struct Draft {
    pos_label: Option<String>,
    translation: Option<String>,
    example_source: Option<String>,
    example_target: Option<String>,
    past_tense: Option<String>,
    past_participle: Option<String>,
    perfect: Option<String>,
    gender: Option<String>,
    plural: Option<String>,
    comparative: Option<String>,
    superlative: Option<String>,
    cases: Vec<String>,
    tags: Vec<String>,
    translations: Vec<Translation>,
    examples: Vec<Example>,
    enriched_from: Option<String>,
    complete: bool,
}

impl Draft {
    fn from_word(word: &Word) -> Self {
        Self {
            pos_label: word.pos_label.clone(),
            translation: word.translation.clone(),
            example_source: word.example_source.clone(),
            example_target: word.example_target.clone(),
            past_tense: word.past_tense.clone(),
            past_participle: word.past_participle.clone(),
            perfect: word.perfect.clone(),
            gender: word.gender.clone(),
            plural: word.plural.clone(),
            comparative: word.comparative.clone(),
            superlative: word.superlative.clone(),
            cases: word.cases.clone(),
            tags: word.tags.clone(),
            translations: word.translations.clone(),
            examples: word.examples.clone(),
            enriched_from: word.enriched_from.clone(),
            complete: word.complete,
        }
    }
}

/// Set a scalar field from a candidate, honoring the overwrite guard.
fn set_guarded(field: &mut Option<String>, candidate: &str, allow_overwrite: bool) {
    if candidate.trim().is_empty() {
        return;
    }
    if allow_overwrite || is_blank(field.as_deref()) {
        *field = Some(candidate.trim().to_string());
    }
}

/// Compute the minimal patch for one word.
pub fn build_patch(word: &Word, bundle: &SuggestionBundle, opts: &MergeOptions) -> Patch {
    let mut draft = Draft::from_word(word);

    merge_primary_translation(&mut draft, bundle, opts);
    merge_translation_array(&mut draft, bundle);
    merge_examples(&mut draft, bundle, opts);
    merge_forms(&mut draft, word.pos, bundle, opts);
    merge_attributes(&mut draft, word.pos, bundle);
    merge_provenance(&mut draft, bundle);
    draft.complete = compute_complete(word.pos, &draft);

    diff(word, &draft)
}

/// Primary translation: first candidate (in provider precedence order)
/// whose language classifies as the target language, else the first
/// non-empty candidate.
fn merge_primary_translation(draft: &mut Draft, bundle: &SuggestionBundle, opts: &MergeOptions) {
    let preferred = bundle
        .translations
        .iter()
        .find(|t| classifies_as_target(t.language.as_deref(), &opts.target_lang))
        .or_else(|| bundle.translations.first());
    if let Some(candidate) = preferred {
        set_guarded(&mut draft.translation, &candidate.value, opts.allow_overwrite);
    }
}

/// Union of stored translations and new candidates, deduplicated on the
/// `(value, source, language)` key. The stored array is only replaced when
/// its canonical form changes.
fn merge_translation_array(draft: &mut Draft, bundle: &SuggestionBundle) {
    let mut merged: Vec<Translation> = Vec::new();
    let mut keys = BTreeSet::new();
    for t in draft.translations.iter().chain(bundle.translations.iter()) {
        if keys.insert(translation_key(t)) {
            merged.push(t.clone());
        }
    }

    if canonical_keys(&merged, translation_key) != canonical_keys(&draft.translations, translation_key)
    {
        draft.translations = merged;
    }
}

/// Analogous union-merge for examples, plus the preferred-example policy
/// for the scalar sentence-pair fields: only a candidate supplying both
/// sides may touch them, each side still honoring the overwrite guard.
fn merge_examples(draft: &mut Draft, bundle: &SuggestionBundle, opts: &MergeOptions) {
    let mut merged: Vec<Example> = Vec::new();
    let mut keys = BTreeSet::new();
    for e in draft.examples.iter().chain(bundle.examples.iter()) {
        if keys.insert(example_key(e)) {
            merged.push(e.clone());
        }
    }
    if canonical_keys(&merged, example_key) != canonical_keys(&draft.examples, example_key) {
        draft.examples = merged;
    }

    // Preferred example: provider priority first, then completeness. A half
    // example never reaches the scalar fields.
    let preferred = bundle.examples.iter().find(|e| e.is_full_pair());
    if let Some(example) = preferred {
        if let Some(ref source) = example.source_sentence {
            set_guarded(&mut draft.example_source, source, opts.allow_overwrite);
        }
        if let Some(ref target) = example.target_sentence {
            set_guarded(&mut draft.example_target, target, opts.allow_overwrite);
        }
    }
}

/// Part-of-speech-specific morphology; exhaustive over the POS.
fn merge_forms(
    draft: &mut Draft,
    pos: PartOfSpeech,
    bundle: &SuggestionBundle,
    opts: &MergeOptions,
) {
    match pos {
        PartOfSpeech::Verb => {
            let Some(resolved) = morphology::resolve_verb(&bundle.forms) else {
                return;
            };
            if let Some(ref past) = resolved.past_tense {
                set_guarded(&mut draft.past_tense, past, opts.allow_overwrite);
            }
            if let Some(ref participle) = resolved.past_participle {
                set_guarded(&mut draft.past_participle, participle, opts.allow_overwrite);
            }
            if let Some(ref perfect) = resolved.perfect_direct {
                set_guarded(&mut draft.perfect, perfect, opts.allow_overwrite);
            }
            // Deterministic derivation when the perfect is still unknown but
            // auxiliary and participle are.
            if is_blank(draft.perfect.as_deref()) {
                if let (Some(auxiliary), Some(participle)) =
                    (resolved.auxiliary.as_deref(), draft.past_participle.as_deref())
                {
                    if let Some(derived) = morphology::derive_perfect(auxiliary, participle) {
                        draft.perfect = Some(derived);
                    }
                }
            }
        }
        PartOfSpeech::Noun => {
            if let Some(gender) = morphology::resolve_noun_gender(&bundle.forms) {
                set_guarded(&mut draft.gender, &gender, opts.allow_overwrite);
            }
            if let Some(plural) = morphology::resolve_noun_plural(&bundle.forms) {
                set_guarded(&mut draft.plural, &plural, opts.allow_overwrite);
            }
        }
        PartOfSpeech::Adjective => {
            let (comparative, superlative) = morphology::resolve_adjective(&bundle.forms);
            if let Some(ref c) = comparative {
                set_guarded(&mut draft.comparative, c, opts.allow_overwrite);
            }
            if let Some(ref s) = superlative {
                set_guarded(&mut draft.superlative, s, opts.allow_overwrite);
            }
        }
        PartOfSpeech::Preposition => {
            let suggested = morphology::collect_cases(&bundle.forms);
            draft.cases = union_sorted(&draft.cases, &suggested);
        }
        PartOfSpeech::Adverb | PartOfSpeech::Phrase | PartOfSpeech::Other => {}
    }
}

/// Tags union-merge plus the part-of-speech label preference: explicit
/// suggested label, else the stored label, else the raw code.
fn merge_attributes(draft: &mut Draft, pos: PartOfSpeech, bundle: &SuggestionBundle) {
    let suggested_tags: Vec<String> = bundle
        .attributes
        .iter()
        .flat_map(|a| a.tags.iter().cloned())
        .collect();
    draft.tags = union_sorted(&draft.tags, &suggested_tags);

    let suggested_label = bundle
        .attributes
        .iter()
        .find_map(|a| a.pos_label.clone());
    draft.pos_label = suggested_label
        .or_else(|| draft.pos_label.clone())
        .or_else(|| Some(pos.code().to_string()));
}

/// Sorted, deduplicated, comma-joined union of existing provenance tokens
/// and newly observed provider identifiers.
fn merge_provenance(draft: &mut Draft, bundle: &SuggestionBundle) {
    if bundle.sources.is_empty() {
        return;
    }
    let mut tokens: BTreeSet<String> = provenance_tokens(draft.enriched_from.as_deref())
        .into_iter()
        .collect();
    tokens.extend(bundle.sources.iter().cloned());
    if tokens.is_empty() {
        return;
    }
    draft.enriched_from = Some(tokens.into_iter().collect::<Vec<_>>().join(", "));
}

/// Completeness: non-blank primary translation, at least one full example
/// pair, plus fully populated POS-specific morphology.
fn compute_complete(pos: PartOfSpeech, draft: &Draft) -> bool {
    let has_example_pair = draft.examples.iter().any(|e| e.is_full_pair())
        || (!is_blank(draft.example_source.as_deref())
            && !is_blank(draft.example_target.as_deref()));
    let base = !is_blank(draft.translation.as_deref()) && has_example_pair;
    if !base {
        return false;
    }
    match pos {
        PartOfSpeech::Verb => {
            !is_blank(draft.past_tense.as_deref())
                && !is_blank(draft.past_participle.as_deref())
                && !is_blank(draft.perfect.as_deref())
        }
        PartOfSpeech::Noun => {
            !is_blank(draft.gender.as_deref()) && !is_blank(draft.plural.as_deref())
        }
        PartOfSpeech::Adjective => {
            !is_blank(draft.comparative.as_deref()) && !is_blank(draft.superlative.as_deref())
        }
        PartOfSpeech::Preposition
        | PartOfSpeech::Adverb
        | PartOfSpeech::Phrase
        | PartOfSpeech::Other => true,
    }
}

/// Emit only the fields whose draft value differs from the stored value.
fn diff(word: &Word, draft: &Draft) -> Patch {
    let mut patch = Patch::new();

    fn scalar(patch: &mut Patch, field: &str, stored: &Option<String>, new: &Option<String>) {
        if stored != new {
            let value = new
                .as_ref()
                .map(|s| Value::String(s.clone()))
                .unwrap_or(Value::Null);
            patch.set(field, value);
        }
    }

    scalar(&mut patch, "pos_label", &word.pos_label, &draft.pos_label);
    scalar(&mut patch, "translation", &word.translation, &draft.translation);
    scalar(&mut patch, "example_source", &word.example_source, &draft.example_source);
    scalar(&mut patch, "example_target", &word.example_target, &draft.example_target);
    scalar(&mut patch, "past_tense", &word.past_tense, &draft.past_tense);
    scalar(&mut patch, "past_participle", &word.past_participle, &draft.past_participle);
    scalar(&mut patch, "perfect", &word.perfect, &draft.perfect);
    scalar(&mut patch, "gender", &word.gender, &draft.gender);
    scalar(&mut patch, "plural", &word.plural, &draft.plural);
    scalar(&mut patch, "comparative", &word.comparative, &draft.comparative);
    scalar(&mut patch, "superlative", &word.superlative, &draft.superlative);
    scalar(&mut patch, "enriched_from", &word.enriched_from, &draft.enriched_from);

    if word.cases != draft.cases {
        patch.set("cases", serde_json::json!(draft.cases));
    }
    if word.tags != draft.tags {
        patch.set("tags", serde_json::json!(draft.tags));
    }
    if word.translations != draft.translations {
        patch.set(
            "translations",
            serde_json::to_value(&draft.translations).unwrap_or(Value::Null),
        );
    }
    if word.examples != draft.examples {
        patch.set(
            "examples",
            serde_json::to_value(&draft.examples).unwrap_or(Value::Null),
        );
    }
    if word.complete != draft.complete {
        patch.set("complete", Value::Bool(draft.complete));
    }

    patch
}

/// Case-insensitive union, deduplicated and sorted.
fn union_sorted(existing: &[String], suggested: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for value in existing.iter().chain(suggested.iter()) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(fold(trimmed)) {
            out.push(trimmed.to_string());
        }
    }
    out.sort_by(|a, b| fold(a).cmp(&fold(b)).then_with(|| a.cmp(b)));
    out
}

fn canonical_keys<T>(items: &[T], key: impl Fn(&T) -> String) -> Vec<String> {
    let mut keys: Vec<String> = items.iter().map(key).collect();
    keys.sort();
    keys
}
