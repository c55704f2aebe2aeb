//! Local dictionary-file provider.
//!
//! Looks a lemma up in a JSON dictionary on disk, keyed by folded lemma and
//! part-of-speech code:
//!
//! ```json
//! {
//!   "abbiegen": {
//!     "verb": {
//!       "translations": [{ "value": "to turn", "language": "en" }],
//!       "forms": { "kind": "verb", "past_tense": "bog ab" }
//!     }
//!   }
//! }
//! ```
//!
//! Offline-friendly; used for curated bulk data and as the default provider
//! in tests and demos.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::config::DictfileProviderConfig;
use crate::models::{CandidateBundle, PartOfSpeech};
use crate::normalize::fold;
use crate::providers::{Lookup, Provider};

type Dictionary = BTreeMap<String, BTreeMap<String, CandidateBundle>>;

pub struct DictfileProvider {
    config: DictfileProviderConfig,
}

impl DictfileProvider {
    pub fn new(config: DictfileProviderConfig) -> Self {
        Self { config }
    }

    fn load(&self) -> Result<Dictionary> {
        let content = std::fs::read_to_string(&self.config.path).with_context(|| {
            format!(
                "Failed to read dictionary file: {}",
                self.config.path.display()
            )
        })?;
        serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse dictionary file: {}",
                self.config.path.display()
            )
        })
    }
}

#[async_trait]
impl Provider for DictfileProvider {
    fn id(&self) -> &str {
        "dictfile"
    }

    fn label(&self) -> &str {
        "Local dictionary file"
    }

    fn health(&self) -> Result<()> {
        if !self.config.path.is_file() {
            anyhow::bail!(
                "Dictionary file not found: {}",
                self.config.path.display()
            );
        }
        Ok(())
    }

    async fn lookup(&self, lemma: &str, pos: PartOfSpeech) -> Result<Option<Lookup>> {
        let dictionary = self.load()?;
        let Some(by_pos) = dictionary.get(&fold(lemma)) else {
            return Ok(None);
        };
        let Some(bundle) = by_pos.get(pos.code()) else {
            return Ok(None);
        };
        if bundle.is_empty() {
            return Ok(None);
        }
        Ok(Some(Lookup::from_bundle(bundle.clone())))
    }
}
