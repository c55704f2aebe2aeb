use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub run: RunConfig,
    pub files: FilesConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Learner's language; translation candidates are classified against
    /// this code (dialect prefixes accepted, e.g. "en-US" for "en").
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    /// Pause between words, to respect provider rate limits.
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_lang: default_target_lang(),
            delay_ms: 0,
            report_dir: default_report_dir(),
            backup_dir: default_backup_dir(),
        }
    }
}

fn default_target_lang() -> String {
    "en".to_string()
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("./data/reports")
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from("./data/backups")
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    /// Directory holding the per-(part-of-speech, provider) snapshot files.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    /// Enabled providers in precedence order. When two providers propose
    /// conflicting values, the one listed first wins.
    #[serde(default = "default_provider_order")]
    pub order: Vec<String>,
    pub dictfile: Option<DictfileProviderConfig>,
    #[serde(default)]
    pub ai: AiProviderConfig,
}

fn default_provider_order() -> Vec<String> {
    vec!["dictfile".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DictfileProviderConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_ai_model(),
            base_url: default_ai_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct MirrorConfig {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate run settings
    if config.run.target_lang.trim().is_empty() {
        anyhow::bail!("run.target_lang must not be empty");
    }

    // Validate provider order
    if config.providers.order.is_empty() {
        anyhow::bail!("providers.order must list at least one provider");
    }
    for id in &config.providers.order {
        match id.as_str() {
            "dictfile" => {
                if config.providers.dictfile.is_none() {
                    anyhow::bail!("providers.dictfile must be configured when enabled");
                }
            }
            // A missing API key is a per-run diagnostic, not a config error.
            "ai" => {}
            other => anyhow::bail!(
                "Unknown provider in providers.order: '{}'. Available: dictfile, ai",
                other
            ),
        }
    }

    if let Some(ref mirror) = config.mirror {
        if mirror.bucket.trim().is_empty() || mirror.region.trim().is_empty() {
            anyhow::bail!("mirror.bucket and mirror.region must not be empty");
        }
    }

    Ok(config)
}
