//! Suggestion collector.
//!
//! Invokes every enabled provider for one word, wraps each result or error
//! into a [`ProviderDraft`] diagnostic, and folds the normalized candidates
//! into a single deduplicated [`SuggestionBundle`]. A provider failure never
//! aborts the other providers for the same word.
//!
//! Providers run one after another; candidates are only combined once every
//! lookup has settled, so precedence-based selection is deterministic
//! regardless of provider latency.

use crate::models::{
    AttributeSuggestion, CandidateBundle, Example, FormSuggestion, FormsPayload, ProviderDraft,
    ProviderStatus, SuggestionBundle, Translation, Word,
};
use crate::normalize::{clean, example_key, fold, translation_key};
use crate::providers::ProviderRegistry;
use std::collections::BTreeSet;

/// Collector result: the merged candidate bundle plus the per-provider
/// drafts handed to the snapshot recorder.
#[derive(Debug, Default)]
pub struct CollectorOutput {
    pub bundle: SuggestionBundle,
    pub drafts: Vec<ProviderDraft>,
}

/// Run all providers for one word and collect their suggestions.
pub async fn collect_suggestions(registry: &ProviderRegistry, word: &Word) -> CollectorOutput {
    let mut drafts = Vec::new();

    for provider in registry.iter() {
        if !provider.supports(word.pos) {
            drafts.push(ProviderDraft {
                id: provider.id().to_string(),
                label: provider.label().to_string(),
                status: ProviderStatus::Skipped,
                error: None,
                bundle: None,
                raw: serde_json::Value::Null,
            });
            continue;
        }

        if let Err(e) = provider.health() {
            drafts.push(ProviderDraft {
                id: provider.id().to_string(),
                label: provider.label().to_string(),
                status: ProviderStatus::Error,
                error: Some(e.to_string()),
                bundle: None,
                raw: serde_json::Value::Null,
            });
            continue;
        }

        let draft = match provider.lookup(&word.lemma, word.pos).await {
            Ok(Some(lookup)) => ProviderDraft {
                id: provider.id().to_string(),
                label: provider.label().to_string(),
                status: ProviderStatus::Ok,
                error: None,
                bundle: Some(normalize_bundle(lookup.bundle)),
                raw: lookup.raw,
            },
            Ok(None) => ProviderDraft {
                id: provider.id().to_string(),
                label: provider.label().to_string(),
                status: ProviderStatus::Ok,
                error: None,
                bundle: None,
                raw: serde_json::Value::Null,
            },
            Err(e) => ProviderDraft {
                id: provider.id().to_string(),
                label: provider.label().to_string(),
                status: ProviderStatus::Error,
                error: Some(e.to_string()),
                bundle: None,
                raw: serde_json::Value::Null,
            },
        };
        drafts.push(draft);
    }

    CollectorOutput {
        bundle: combine_drafts(&drafts),
        drafts,
    }
}

/// Fold the per-provider drafts into one deduplicated bundle, in draft
/// (= provider precedence) order.
pub fn combine_drafts(drafts: &[ProviderDraft]) -> SuggestionBundle {
    let mut bundle = SuggestionBundle::default();
    let mut translation_keys = BTreeSet::new();
    let mut example_keys = BTreeSet::new();
    let mut sources = BTreeSet::new();

    for draft in drafts {
        let Some(ref candidate) = draft.bundle else {
            continue;
        };
        if candidate.is_empty() {
            continue;
        }
        sources.insert(fold(&draft.id));

        for t in &candidate.translations {
            let translation = Translation {
                value: t.value.clone(),
                source: draft.id.clone(),
                language: t.language.clone(),
                confidence: t.confidence,
            };
            if translation_keys.insert(translation_key(&translation)) {
                bundle.translations.push(translation);
            }
        }

        for e in &candidate.examples {
            let example = Example {
                source_sentence: e.source_sentence.clone(),
                target_sentence: e.target_sentence.clone(),
                source: draft.id.clone(),
            };
            if example_keys.insert(example_key(&example)) {
                bundle.examples.push(example);
            }
        }

        if let Some(ref payload) = candidate.forms {
            bundle.forms.push(FormSuggestion {
                source: draft.id.clone(),
                payload: payload.clone(),
            });
        }

        if !candidate.tags.is_empty() || candidate.pos_label.is_some() {
            bundle.attributes.push(AttributeSuggestion {
                source: draft.id.clone(),
                tags: candidate.tags.clone(),
                pos_label: candidate.pos_label.clone(),
            });
        }
    }

    bundle.sources = sources.into_iter().collect();
    bundle
}

/// Trim every candidate value; blank values and empty elements disappear
/// instead of erroring.
fn normalize_bundle(bundle: CandidateBundle) -> CandidateBundle {
    let mut out = CandidateBundle {
        pos_label: bundle.pos_label.as_deref().and_then(clean),
        ..Default::default()
    };

    for mut t in bundle.translations {
        let Some(value) = clean(&t.value) else {
            continue;
        };
        t.value = value;
        t.language = t.language.as_deref().and_then(clean);
        out.translations.push(t);
    }

    for e in bundle.examples {
        let source_sentence = e.source_sentence.as_deref().and_then(clean);
        let target_sentence = e.target_sentence.as_deref().and_then(clean);
        if source_sentence.is_none() && target_sentence.is_none() {
            continue;
        }
        out.examples.push(crate::models::CandidateExample {
            source_sentence,
            target_sentence,
        });
    }

    out.tags = bundle.tags.iter().filter_map(|t| clean(t)).collect();
    out.forms = bundle.forms.map(normalize_forms);
    out
}

fn normalize_forms(payload: FormsPayload) -> FormsPayload {
    fn clean_list(values: Vec<String>) -> Vec<String> {
        values.iter().filter_map(|v| clean(v)).collect()
    }
    fn clean_tagged(forms: Vec<crate::models::TaggedForm>) -> Vec<crate::models::TaggedForm> {
        forms
            .into_iter()
            .filter_map(|f| {
                clean(&f.form).map(|form| crate::models::TaggedForm {
                    form,
                    tags: clean_list(f.tags),
                })
            })
            .collect()
    }

    match payload {
        FormsPayload::Verb(v) => FormsPayload::Verb(crate::models::VerbForms {
            past_tense: v.past_tense.as_deref().and_then(clean),
            past_participle: v.past_participle.as_deref().and_then(clean),
            perfect_options: clean_list(v.perfect_options),
            auxiliaries: clean_list(v.auxiliaries),
            auxiliary: v.auxiliary.as_deref().and_then(clean),
        }),
        FormsPayload::Noun(n) => FormsPayload::Noun(crate::models::NounForms {
            genders: clean_list(n.genders),
            plurals: clean_list(n.plurals),
            forms: clean_tagged(n.forms),
        }),
        FormsPayload::Adjective(a) => FormsPayload::Adjective(crate::models::AdjectiveForms {
            comparatives: clean_list(a.comparatives),
            superlatives: clean_list(a.superlatives),
            forms: clean_tagged(a.forms),
        }),
        FormsPayload::Preposition(p) => FormsPayload::Preposition(crate::models::PrepositionForms {
            cases: clean_list(p.cases),
        }),
    }
}
