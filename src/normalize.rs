//! Normalization helpers: dedup keys, blank checks, and language/gender
//! classification.
//!
//! Every merge and dedup decision in the engine goes through these functions
//! so that candidates differing only in case or surrounding whitespace are
//! treated as identical. Malformed values degrade to "absent" rather than
//! erroring.

use crate::models::{Example, Translation};

/// Case-fold and whitespace-fold a value into its canonical key form.
///
/// Interior whitespace runs collapse to a single space so that
/// `"bog  ab"` and `"bog ab"` produce the same key.
pub fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether an optional scalar field counts as blank (absent or
/// whitespace-only).
pub fn is_blank(value: Option<&str>) -> bool {
    value.map(|s| s.trim().is_empty()).unwrap_or(true)
}

/// Trim a candidate value; empty results become `None`.
pub fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Dedup key for a translation: `(value, source, language)` folded.
pub fn translation_key(t: &Translation) -> String {
    format!(
        "{}\u{1f}{}\u{1f}{}",
        fold(&t.value),
        fold(&t.source),
        fold(t.language.as_deref().unwrap_or(""))
    )
}

/// Dedup key for an example: `(source sentence, target sentence, source)`
/// folded.
pub fn example_key(e: &Example) -> String {
    format!(
        "{}\u{1f}{}\u{1f}{}",
        fold(e.source_sentence.as_deref().unwrap_or("")),
        fold(e.target_sentence.as_deref().unwrap_or("")),
        fold(&e.source)
    )
}

/// Whether a candidate's language classifies as the configured target
/// language: unset, the exact code, or a dialect-prefixed form of it
/// (`"en-US"` classifies as `"en"`).
pub fn classifies_as_target(language: Option<&str>, target: &str) -> bool {
    let Some(lang) = language else {
        return true;
    };
    let lang = fold(lang);
    if lang.is_empty() {
        return true;
    }
    let target = fold(target);
    lang == target || lang.starts_with(&format!("{}-", target))
}

/// Normalize a gender hint to one of the three definite articles, when
/// possible. Accepts articles and English/German gender names.
pub fn normalize_gender(hint: &str) -> Option<String> {
    match fold(hint).as_str() {
        "der" | "masculine" | "maskulin" | "m" => Some("der".to_string()),
        "die" | "feminine" | "feminin" | "f" => Some("die".to_string()),
        "das" | "neuter" | "neutrum" | "n" => Some("das".to_string()),
        _ => None,
    }
}

/// Normalize an auxiliary string: `"haben"`, `"sein"`, or the composite
/// `"haben / sein"` when the string mentions both.
pub fn normalize_auxiliary(raw: &str) -> Option<String> {
    let folded = fold(raw);
    let haben = folded.contains("haben") || folded == "hat";
    let sein = folded.contains("sein") || folded == "ist";
    match (haben, sein) {
        (true, true) => Some("haben / sein".to_string()),
        (true, false) => Some("haben".to_string()),
        (false, true) => Some("sein".to_string()),
        (false, false) => None,
    }
}

/// Split a stored provenance string into its tokens.
pub fn provenance_tokens(stored: Option<&str>) -> Vec<String> {
    stored
        .unwrap_or("")
        .split(',')
        .map(|t| fold(t))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_collapses_case_and_whitespace() {
        assert_eq!(fold("  Bog   AB "), "bog ab");
        assert_eq!(fold("Äpfel"), "äpfel");
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(None));
        assert!(is_blank(Some("   ")));
        assert!(!is_blank(Some("x")));
    }

    #[test]
    fn translation_keys_are_case_insensitive() {
        let a = Translation {
            value: "To Turn".into(),
            source: "dictfile".into(),
            language: Some("EN".into()),
            confidence: None,
        };
        let b = Translation {
            value: "to turn".into(),
            source: "Dictfile".into(),
            language: Some("en".into()),
            confidence: Some(0.9),
        };
        assert_eq!(translation_key(&a), translation_key(&b));
    }

    #[test]
    fn language_classification_accepts_dialects_and_unset() {
        assert!(classifies_as_target(None, "en"));
        assert!(classifies_as_target(Some(""), "en"));
        assert!(classifies_as_target(Some("en"), "en"));
        assert!(classifies_as_target(Some("en-US"), "en"));
        assert!(!classifies_as_target(Some("enx"), "en"));
        assert!(!classifies_as_target(Some("de"), "en"));
    }

    #[test]
    fn gender_hints_normalize_to_articles() {
        assert_eq!(normalize_gender("Masculine").as_deref(), Some("der"));
        assert_eq!(normalize_gender("die").as_deref(), Some("die"));
        assert_eq!(normalize_gender("neutrum").as_deref(), Some("das"));
        assert_eq!(normalize_gender("plural"), None);
    }

    #[test]
    fn auxiliary_normalization() {
        assert_eq!(normalize_auxiliary("haben").as_deref(), Some("haben"));
        assert_eq!(
            normalize_auxiliary("haben oder sein").as_deref(),
            Some("haben / sein")
        );
        assert_eq!(normalize_auxiliary("werden"), None);
    }

    #[test]
    fn provenance_splitting() {
        assert_eq!(
            provenance_tokens(Some("dictfile, AI,, ")),
            vec!["dictfile".to_string(), "ai".to_string()]
        );
        assert!(provenance_tokens(None).is_empty());
    }
}
