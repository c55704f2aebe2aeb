//! Provider adapter trait and registry.
//!
//! A [`Provider`] wraps one external data source and returns a normalized
//! [`CandidateBundle`] for a lemma lookup. The engine depends only on this
//! contract; transports live inside the adapters.
//!
//! Registration order in the [`ProviderRegistry`] is candidate precedence:
//! when two providers propose conflicting values, the one registered first
//! wins.

use anyhow::Result;
use async_trait::async_trait;

use crate::adapter_ai::AiProvider;
use crate::adapter_dictfile::DictfileProvider;
use crate::config::Config;
use crate::models::{CandidateBundle, PartOfSpeech};

/// One provider lookup result: the normalized bundle plus the raw payload
/// kept for snapshot history.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub bundle: CandidateBundle,
    pub raw: serde_json::Value,
}

impl Lookup {
    /// Build a lookup whose raw payload is the bundle itself (for adapters
    /// without a distinct wire format, like the dictionary file).
    pub fn from_bundle(bundle: CandidateBundle) -> Self {
        let raw = serde_json::to_value(&bundle).unwrap_or(serde_json::Value::Null);
        Self { bundle, raw }
    }
}

/// A data source returning candidate linguistic facts for a lemma.
///
/// # Contract
///
/// - [`lookup`](Provider::lookup) returns `Ok(None)` for an ordinary
///   "not found" and `Err` only for transport or parse failure.
/// - [`health`](Provider::health) reports configuration problems (missing
///   file, missing API key). A failing health check becomes an `"error"`
///   diagnostic on every word; it never aborts the run.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider identifier (e.g. `"dictfile"`). Used in dedup keys,
    /// provenance, snapshots, and file names.
    fn id(&self) -> &str;

    /// Human-readable label for diagnostics and reports.
    fn label(&self) -> &str;

    /// Whether this provider has data for the given part of speech.
    /// Unsupported parts of speech produce a `"skipped"` diagnostic.
    fn supports(&self, _pos: PartOfSpeech) -> bool {
        true
    }

    /// Cheap configuration check, run once per word before `lookup`.
    fn health(&self) -> Result<()> {
        Ok(())
    }

    /// Look up one lemma.
    async fn lookup(&self, lemma: &str, pos: PartOfSpeech) -> Result<Option<Lookup>>;
}

/// Holds the enabled providers in precedence order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Precedence follows registration order.
    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Provider> {
        self.providers.iter().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Build the registry from configuration, preserving `providers.order`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for id in &config.providers.order {
            match id.as_str() {
                "dictfile" => {
                    let dictfile = config
                        .providers
                        .dictfile
                        .as_ref()
                        .ok_or_else(|| anyhow::anyhow!("providers.dictfile not configured"))?;
                    registry.register(Box::new(DictfileProvider::new(dictfile.clone())));
                }
                "ai" => {
                    if config.providers.ai.enabled {
                        registry.register(Box::new(AiProvider::new(config.providers.ai.clone())));
                    } else {
                        eprintln!("Warning: provider 'ai' listed in providers.order but not enabled; skipping");
                    }
                }
                other => anyhow::bail!("Unknown provider: '{}'", other),
            }
        }
        Ok(registry)
    }
}
