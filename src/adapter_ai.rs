//! AI provider: chat-completions lookup against an OpenAI-compatible API.
//!
//! Asks the model for a strict-JSON description of the lemma (translations,
//! one example pair, part-of-speech forms) and maps it into a
//! [`CandidateBundle`]. Requires the `OPENAI_API_KEY` environment variable;
//! a missing key is a configuration diagnostic, never a thrown error.
//!
//! # Retry strategy
//!
//! - HTTP 429 and 5xx → retry with backoff (1s, 2s)
//! - other 4xx → fail immediately
//! - network errors → retry

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::AiProviderConfig;
use crate::models::{
    AdjectiveForms, CandidateBundle, CandidateExample, CandidateTranslation, FormsPayload,
    NounForms, PartOfSpeech, PrepositionForms, VerbForms,
};
use crate::providers::{Lookup, Provider};

const MAX_RETRIES: u32 = 2;

pub struct AiProvider {
    config: AiProviderConfig,
}

impl AiProvider {
    pub fn new(config: AiProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Provider for AiProvider {
    fn id(&self) -> &str {
        "ai"
    }

    fn label(&self) -> &str {
        "AI lookup"
    }

    fn health(&self) -> Result<()> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Ok(())
    }

    async fn lookup(&self, lemma: &str, pos: PartOfSpeech) -> Result<Option<Lookup>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.config.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system_prompt(pos) },
                { "role": "user", "content": lemma },
            ],
        });

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut last_err = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
            }

            let response = match client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(anyhow::anyhow!("AI request failed: {}", e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                last_err = Some(anyhow::anyhow!("AI request failed (HTTP {})", status));
                continue;
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                bail!(
                    "AI request failed (HTTP {}): {}",
                    status,
                    text.chars().take(300).collect::<String>()
                );
            }

            let raw: serde_json::Value = response.json().await?;
            let content = raw
                .pointer("/choices/0/message/content")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("AI response missing message content"))?;
            let parsed: serde_json::Value = serde_json::from_str(content)
                .map_err(|e| anyhow::anyhow!("AI returned non-JSON content: {}", e))?;

            let bundle = parse_bundle(&parsed, pos);
            if bundle.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Lookup { bundle, raw }));
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("AI request failed")))
    }
}

fn system_prompt(pos: PartOfSpeech) -> String {
    format!(
        "You are a German lexicon assistant. For the given German {} respond \
         with a single JSON object with keys: \"translations\" (array of \
         {{\"value\", \"language\", \"confidence\"}}), \"examples\" (array of \
         {{\"source_sentence\" in German, \"target_sentence\" translated}}), \
         \"tags\" (array of strings), and depending on the part of speech: \
         \"verb\" ({{\"past_tense\", \"past_participle\", \"perfect_options\" \
         array, \"auxiliaries\" array of \"haben\"/\"sein\"}}), \
         \"noun\" ({{\"gender\" article, \"plural\"}}), \
         \"adjective\" ({{\"comparative\", \"superlative\"}}), \
         \"preposition\" ({{\"cases\" array}}). \
         Omit anything you are not certain about. If the word is unknown, \
         respond with an empty JSON object.",
        pos.code()
    )
}

/// Map the model's JSON into a candidate bundle. Malformed pieces are
/// dropped rather than erroring.
fn parse_bundle(value: &serde_json::Value, pos: PartOfSpeech) -> CandidateBundle {
    let mut bundle = CandidateBundle::default();

    if let Some(items) = value.get("translations").and_then(|v| v.as_array()) {
        for item in items {
            let Some(text) = item.get("value").and_then(|v| v.as_str()) else {
                continue;
            };
            bundle.translations.push(CandidateTranslation {
                value: text.to_string(),
                language: item
                    .get("language")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                confidence: item.get("confidence").and_then(|v| v.as_f64()),
            });
        }
    }

    if let Some(items) = value.get("examples").and_then(|v| v.as_array()) {
        for item in items {
            let source_sentence = item
                .get("source_sentence")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let target_sentence = item
                .get("target_sentence")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            if source_sentence.is_none() && target_sentence.is_none() {
                continue;
            }
            bundle.examples.push(CandidateExample {
                source_sentence,
                target_sentence,
            });
        }
    }

    if let Some(tags) = value.get("tags").and_then(|v| v.as_array()) {
        bundle.tags = tags
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect();
    }

    bundle.forms = parse_forms(value, pos);
    bundle
}

fn parse_forms(value: &serde_json::Value, pos: PartOfSpeech) -> Option<FormsPayload> {
    fn string_field(obj: &serde_json::Value, key: &str) -> Option<String> {
        obj.get(key).and_then(|v| v.as_str()).map(str::to_string)
    }
    fn string_list(obj: &serde_json::Value, key: &str) -> Vec<String> {
        obj.get(key)
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    match pos {
        PartOfSpeech::Verb => {
            let obj = value.get("verb")?;
            let forms = VerbForms {
                past_tense: string_field(obj, "past_tense"),
                past_participle: string_field(obj, "past_participle"),
                perfect_options: string_list(obj, "perfect_options"),
                auxiliaries: string_list(obj, "auxiliaries"),
                auxiliary: string_field(obj, "auxiliary"),
            };
            forms.has_any().then_some(FormsPayload::Verb(forms))
        }
        PartOfSpeech::Noun => {
            let obj = value.get("noun")?;
            let forms = NounForms {
                genders: string_field(obj, "gender").into_iter().collect(),
                plurals: string_field(obj, "plural").into_iter().collect(),
                forms: Vec::new(),
            };
            (!forms.genders.is_empty() || !forms.plurals.is_empty())
                .then_some(FormsPayload::Noun(forms))
        }
        PartOfSpeech::Adjective => {
            let obj = value.get("adjective")?;
            let forms = AdjectiveForms {
                comparatives: string_field(obj, "comparative").into_iter().collect(),
                superlatives: string_field(obj, "superlative").into_iter().collect(),
                forms: Vec::new(),
            };
            (!forms.comparatives.is_empty() || !forms.superlatives.is_empty())
                .then_some(FormsPayload::Adjective(forms))
        }
        PartOfSpeech::Preposition => {
            let obj = value.get("preposition")?;
            let forms = PrepositionForms {
                cases: string_list(obj, "cases"),
            };
            (!forms.cases.is_empty()).then_some(FormsPayload::Preposition(forms))
        }
        PartOfSpeech::Adverb | PartOfSpeech::Phrase | PartOfSpeech::Other => None,
    }
}
