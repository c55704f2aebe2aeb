//! Part-of-speech-specific candidate selection.
//!
//! Pure selection policies over the collected form suggestions. Every
//! function is deterministic: provider precedence comes from suggestion
//! order, remaining ties break lexicographically.

use crate::models::{AdjectiveForms, FormSuggestion, FormsPayload, NounForms, VerbForms};
use crate::normalize::{fold, normalize_auxiliary, normalize_gender};

/// Resolved verb morphology from the first usable verb suggestion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerbResolution {
    pub past_tense: Option<String>,
    pub past_participle: Option<String>,
    /// Set only when the candidate offered exactly one perfect-form option.
    /// Multiple options mean the auxiliary is ambiguous and guessing could
    /// pick the wrong one.
    pub perfect_direct: Option<String>,
    /// "haben", "sein", or the composite "haben / sein".
    pub auxiliary: Option<String>,
}

/// Pick the first verb suggestion (provider precedence order) offering any
/// of past tense, past participle, perfect form, or auxiliary, and resolve
/// it.
pub fn resolve_verb(suggestions: &[FormSuggestion]) -> Option<VerbResolution> {
    let forms = suggestions.iter().find_map(|s| match &s.payload {
        FormsPayload::Verb(v) if v.has_any() => Some(v),
        _ => None,
    })?;

    Some(VerbResolution {
        past_tense: forms.past_tense.clone(),
        past_participle: forms.past_participle.clone(),
        perfect_direct: if forms.perfect_options.len() == 1 {
            Some(forms.perfect_options[0].clone())
        } else {
            None
        },
        auxiliary: resolve_auxiliary(forms),
    })
}

/// Auxiliary resolution: both "haben" and "sein" hints present yields the
/// composite, exactly one yields that one, otherwise the directly supplied
/// auxiliary string is normalized the same way.
fn resolve_auxiliary(forms: &VerbForms) -> Option<String> {
    let mut haben = false;
    let mut sein = false;
    for hint in &forms.auxiliaries {
        match normalize_auxiliary(hint).as_deref() {
            Some("haben") => haben = true,
            Some("sein") => sein = true,
            Some("haben / sein") => {
                haben = true;
                sein = true;
            }
            _ => {}
        }
    }
    match (haben, sein) {
        (true, true) => Some("haben / sein".to_string()),
        (true, false) => Some("haben".to_string()),
        (false, true) => Some("sein".to_string()),
        (false, false) => forms.auxiliary.as_deref().and_then(normalize_auxiliary),
    }
}

/// Derive the perfect tense from an auxiliary and a past participle:
/// `"hat <participle>"` for haben, `"ist <participle>"` for sein, and the
/// slash-joined pair for the composite auxiliary.
pub fn derive_perfect(auxiliary: &str, participle: &str) -> Option<String> {
    match auxiliary {
        "haben" => Some(format!("hat {}", participle)),
        "sein" => Some(format!("ist {}", participle)),
        "haben / sein" => Some(format!("hat {} / ist {}", participle, participle)),
        _ => None,
    }
}

/// Choose the gender from all hints across every noun suggestion: explicit
/// hints plus gender tags on raw forms. A fixed preference order over the
/// three articles (der, die, das) applies; hints that are none of the three
/// fall back to the lexicographically smallest hint.
pub fn resolve_noun_gender(suggestions: &[FormSuggestion]) -> Option<String> {
    let mut articles = Vec::new();
    let mut raw_hints = Vec::new();

    for forms in noun_payloads(suggestions) {
        for hint in &forms.genders {
            match normalize_gender(hint) {
                Some(article) => articles.push(article),
                None => raw_hints.push(hint.clone()),
            }
        }
        for form in &forms.forms {
            for tag in &form.tags {
                if let Some(article) = normalize_gender(tag) {
                    articles.push(article);
                }
            }
        }
    }

    for preferred in ["der", "die", "das"] {
        if articles.iter().any(|a| a == preferred) {
            return Some(preferred.to_string());
        }
    }
    raw_hints.sort_by(|a, b| fold(a).cmp(&fold(b)).then_with(|| a.cmp(b)));
    raw_hints.into_iter().next()
}

/// Choose the plural by scoring every candidate across all noun
/// suggestions. A raw form tagged both "plural" and "nominative" scores
/// best, any other "plural"-tagged form next, and explicit plural entries
/// last. Lowest score wins; ties break lexicographically.
pub fn resolve_noun_plural(suggestions: &[FormSuggestion]) -> Option<String> {
    let mut scored: Vec<(u8, String)> = Vec::new();

    for forms in noun_payloads(suggestions) {
        for form in &forms.forms {
            let tags: Vec<String> = form.tags.iter().map(|t| fold(t)).collect();
            let plural = tags.iter().any(|t| t == "plural");
            if !plural {
                continue;
            }
            let nominative = tags.iter().any(|t| t == "nominative");
            scored.push((if nominative { 0 } else { 1 }, form.form.clone()));
        }
        for plural in &forms.plurals {
            scored.push((2, plural.clone()));
        }
    }

    scored.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| fold(&a.1).cmp(&fold(&b.1)))
            .then_with(|| a.1.cmp(&b.1))
    });
    scored.into_iter().next().map(|(_, form)| form)
}

/// Comparative and superlative from the union of explicit lists and
/// tag-matched raw forms; lexicographically smallest wins.
pub fn resolve_adjective(suggestions: &[FormSuggestion]) -> (Option<String>, Option<String>) {
    let mut comparatives = Vec::new();
    let mut superlatives = Vec::new();

    for suggestion in suggestions {
        let FormsPayload::Adjective(AdjectiveForms {
            comparatives: explicit_comp,
            superlatives: explicit_sup,
            forms,
        }) = &suggestion.payload
        else {
            continue;
        };
        comparatives.extend(explicit_comp.iter().cloned());
        superlatives.extend(explicit_sup.iter().cloned());
        for form in forms {
            let tags: Vec<String> = form.tags.iter().map(|t| fold(t)).collect();
            if tags.iter().any(|t| t == "comparative") {
                comparatives.push(form.form.clone());
            }
            if tags.iter().any(|t| t == "superlative") {
                superlatives.push(form.form.clone());
            }
        }
    }

    (smallest(comparatives), smallest(superlatives))
}

/// All governed cases suggested for a preposition, in suggestion order.
pub fn collect_cases(suggestions: &[FormSuggestion]) -> Vec<String> {
    let mut cases = Vec::new();
    for suggestion in suggestions {
        if let FormsPayload::Preposition(p) = &suggestion.payload {
            cases.extend(p.cases.iter().cloned());
        }
    }
    cases
}

fn noun_payloads(suggestions: &[FormSuggestion]) -> impl Iterator<Item = &NounForms> {
    suggestions.iter().filter_map(|s| match &s.payload {
        FormsPayload::Noun(n) => Some(n),
        _ => None,
    })
}

fn smallest(mut values: Vec<String>) -> Option<String> {
    values.sort_by(|a, b| fold(a).cmp(&fold(b)).then_with(|| a.cmp(b)));
    values.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaggedForm;

    fn verb_suggestion(source: &str, forms: VerbForms) -> FormSuggestion {
        FormSuggestion {
            source: source.to_string(),
            payload: FormsPayload::Verb(forms),
        }
    }

    fn noun_suggestion(source: &str, forms: NounForms) -> FormSuggestion {
        FormSuggestion {
            source: source.to_string(),
            payload: FormsPayload::Noun(forms),
        }
    }

    #[test]
    fn first_usable_verb_suggestion_wins() {
        let suggestions = vec![
            verb_suggestion("empty", VerbForms::default()),
            verb_suggestion(
                "first",
                VerbForms {
                    past_tense: Some("bog ab".into()),
                    ..Default::default()
                },
            ),
            verb_suggestion(
                "second",
                VerbForms {
                    past_tense: Some("wich ab".into()),
                    ..Default::default()
                },
            ),
        ];
        let resolved = resolve_verb(&suggestions).unwrap();
        assert_eq!(resolved.past_tense.as_deref(), Some("bog ab"));
    }

    #[test]
    fn ambiguous_perfect_options_are_not_applied_directly() {
        let suggestions = vec![verb_suggestion(
            "dictfile",
            VerbForms {
                past_participle: Some("abgebogen".into()),
                perfect_options: vec!["hat abgebogen".into(), "ist abgebogen".into()],
                auxiliaries: vec!["haben".into(), "sein".into()],
                ..Default::default()
            },
        )];
        let resolved = resolve_verb(&suggestions).unwrap();
        assert_eq!(resolved.perfect_direct, None);
        assert_eq!(resolved.auxiliary.as_deref(), Some("haben / sein"));
    }

    #[test]
    fn single_perfect_option_applies_directly() {
        let suggestions = vec![verb_suggestion(
            "dictfile",
            VerbForms {
                perfect_options: vec!["hat gemacht".into()],
                ..Default::default()
            },
        )];
        let resolved = resolve_verb(&suggestions).unwrap();
        assert_eq!(resolved.perfect_direct.as_deref(), Some("hat gemacht"));
    }

    #[test]
    fn auxiliary_falls_back_to_supplied_string() {
        let suggestions = vec![verb_suggestion(
            "dictfile",
            VerbForms {
                past_participle: Some("gereist".into()),
                auxiliary: Some("Hilfsverb: sein".into()),
                ..Default::default()
            },
        )];
        let resolved = resolve_verb(&suggestions).unwrap();
        assert_eq!(resolved.auxiliary.as_deref(), Some("sein"));
    }

    #[test]
    fn derive_perfect_covers_all_auxiliaries() {
        assert_eq!(
            derive_perfect("haben", "gemacht").as_deref(),
            Some("hat gemacht")
        );
        assert_eq!(
            derive_perfect("sein", "gereist").as_deref(),
            Some("ist gereist")
        );
        assert_eq!(
            derive_perfect("haben / sein", "abgebogen").as_deref(),
            Some("hat abgebogen / ist abgebogen")
        );
        assert_eq!(derive_perfect("werden", "x"), None);
    }

    #[test]
    fn gender_preference_order_is_der_die_das() {
        let suggestions = vec![noun_suggestion(
            "dictfile",
            NounForms {
                genders: vec!["das".into(), "die".into()],
                ..Default::default()
            },
        )];
        assert_eq!(resolve_noun_gender(&suggestions).as_deref(), Some("die"));
    }

    #[test]
    fn gender_hints_come_from_tags_too() {
        let suggestions = vec![noun_suggestion(
            "dictfile",
            NounForms {
                forms: vec![TaggedForm {
                    form: "Apfel".into(),
                    tags: vec!["masculine".into(), "nominative".into()],
                }],
                ..Default::default()
            },
        )];
        assert_eq!(resolve_noun_gender(&suggestions).as_deref(), Some("der"));
    }

    #[test]
    fn unrecognized_gender_hints_fall_back_lexicographically() {
        let suggestions = vec![noun_suggestion(
            "dictfile",
            NounForms {
                genders: vec!["utrum".into(), "commune".into()],
                ..Default::default()
            },
        )];
        assert_eq!(resolve_noun_gender(&suggestions).as_deref(), Some("commune"));
    }

    #[test]
    fn plural_scoring_prefers_nominative_tagged_forms() {
        let suggestions = vec![noun_suggestion(
            "dictfile",
            NounForms {
                plurals: vec!["Apfelsorten".into()],
                forms: vec![
                    TaggedForm {
                        form: "Äpfeln".into(),
                        tags: vec!["plural".into(), "dative".into()],
                    },
                    TaggedForm {
                        form: "Äpfel".into(),
                        tags: vec!["plural".into(), "nominative".into()],
                    },
                ],
                ..Default::default()
            },
        )];
        assert_eq!(resolve_noun_plural(&suggestions).as_deref(), Some("Äpfel"));
    }

    #[test]
    fn explicit_plurals_score_below_tagged_forms() {
        let suggestions = vec![noun_suggestion(
            "dictfile",
            NounForms {
                plurals: vec!["Autos".into()],
                forms: vec![TaggedForm {
                    form: "Wagen".into(),
                    tags: vec!["plural".into()],
                }],
                ..Default::default()
            },
        )];
        assert_eq!(resolve_noun_plural(&suggestions).as_deref(), Some("Wagen"));
    }

    #[test]
    fn adjective_selection_unions_explicit_and_tagged() {
        let suggestions = vec![FormSuggestion {
            source: "dictfile".into(),
            payload: FormsPayload::Adjective(AdjectiveForms {
                comparatives: vec!["schöner".into()],
                superlatives: Vec::new(),
                forms: vec![TaggedForm {
                    form: "am schönsten".into(),
                    tags: vec!["superlative".into()],
                }],
            }),
        }];
        let (comparative, superlative) = resolve_adjective(&suggestions);
        assert_eq!(comparative.as_deref(), Some("schöner"));
        assert_eq!(superlative.as_deref(), Some("am schönsten"));
    }

    #[test]
    fn preposition_cases_are_collected_in_order() {
        let suggestions = vec![FormSuggestion {
            source: "dictfile".into(),
            payload: FormsPayload::Preposition(crate::models::PrepositionForms {
                cases: vec!["dative".into(), "accusative".into()],
            }),
        }];
        assert_eq!(
            collect_cases(&suggestions),
            vec!["dative".to_string(), "accusative".to_string()]
        );
    }
}
