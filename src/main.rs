//! # Wortschatz CLI (`wort`)
//!
//! Commands for schema initialization, word import, provider health, and
//! running the enrichment pipeline.
//!
//! ```bash
//! wort init                          # create the SQLite schema
//! wort import words.json             # seed or update words
//! wort providers                     # list adapters and their health
//! wort enrich                        # preview (dry run)
//! wort enrich --apply --pos noun     # apply patches for nouns
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use uuid::Uuid;

use wortschatz::config::load_config;
use wortschatz::models::{PartOfSpeech, RunMode, Scope, Word, WordFilter};
use wortschatz::pipeline::{self, RunOptions};
use wortschatz::providers::ProviderRegistry;
use wortschatz::{db, migrate, mirror, store};

/// Wortschatz — enrichment engine for a German vocabulary trainer.
#[derive(Parser)]
#[command(
    name = "wort",
    about = "Wortschatz — provider-driven enrichment for a German vocabulary trainer",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wort.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// List configured providers and their health status.
    Providers,

    /// Import words from a JSON array (seed or curation update).
    Import {
        /// Path to a JSON file containing an array of words.
        file: PathBuf,
    },

    /// Run the enrichment pipeline. Default is a preview (dry run).
    Enrich {
        /// Apply patches and write provider files instead of previewing.
        #[arg(long)]
        apply: bool,

        /// Word scope: all, curated, or uncurated.
        #[arg(long, default_value = "all")]
        scope: String,

        /// Only process words not yet marked complete.
        #[arg(long)]
        incomplete_only: bool,

        /// Restrict to parts of speech (repeatable), e.g. --pos noun.
        #[arg(long)]
        pos: Vec<String>,

        /// Maximum number of words to process.
        #[arg(long)]
        limit: Option<i64>,

        /// Pause between words in milliseconds, overriding the config.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Replace non-blank stored fields with candidate values.
        #[arg(long)]
        allow_overwrite: bool,

        /// Trigger label recorded in snapshots and the report.
        #[arg(long, default_value = "manual")]
        trigger: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("initialized {}", config.db.path.display());
        }

        Commands::Providers => {
            let registry = ProviderRegistry::from_config(&config)?;
            if registry.is_empty() {
                println!("no providers configured");
            }
            for provider in registry.iter() {
                match provider.health() {
                    Ok(()) => println!("  {:<12} {:<24} ok", provider.id(), provider.label()),
                    Err(e) => println!("  {:<12} {:<24} error: {}", provider.id(), provider.label(), e),
                }
            }
        }

        Commands::Import { file } => {
            let pool = db::connect(&config).await?;
            let count = import_words(&pool, &file).await?;
            pool.close().await;
            println!("imported {} words", count);
        }

        Commands::Enrich {
            apply,
            scope,
            incomplete_only,
            pos,
            limit,
            delay_ms,
            allow_overwrite,
            trigger,
        } => {
            let Some(scope) = Scope::parse(&scope) else {
                bail!("Unknown scope: '{}'. Available: all, curated, uncurated", scope);
            };
            let pos_filter = if pos.is_empty() {
                None
            } else {
                Some(pos.iter().map(|p| PartOfSpeech::from_code(p)).collect())
            };

            let mut config = config;
            if let Some(delay) = delay_ms {
                config.run.delay_ms = delay;
            }

            let pool = db::connect(&config).await?;
            let registry = ProviderRegistry::from_config(&config)?;
            if registry.is_empty() {
                bail!("No providers enabled; check providers.order in the config");
            }
            let sink = mirror::create_sink(config.mirror.as_ref());

            let opts = RunOptions {
                mode: if apply { RunMode::Apply } else { RunMode::Preview },
                trigger,
                filter: WordFilter {
                    scope,
                    incomplete_only,
                    pos: pos_filter,
                    limit,
                },
                allow_overwrite,
            };

            pipeline::run(&config, &pool, &registry, sink.as_ref(), &opts).await?;
            pool.close().await;
        }
    }

    Ok(())
}

/// Import file entry: a subset of the word fields, everything optional
/// except lemma and pos.
#[derive(Debug, Deserialize)]
struct ImportWord {
    lemma: String,
    pos: String,
    #[serde(default)]
    pos_label: Option<String>,
    #[serde(default)]
    translation: Option<String>,
    #[serde(default)]
    example_source: Option<String>,
    #[serde(default)]
    example_target: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    plural: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    curated: bool,
}

async fn import_words(pool: &sqlx::SqlitePool, file: &PathBuf) -> Result<usize> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;
    let items: Vec<ImportWord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse import file: {}", file.display()))?;

    let count = items.len();
    for item in items {
        let word = Word {
            id: Uuid::new_v4().to_string(),
            lemma: item.lemma,
            pos: PartOfSpeech::from_code(&item.pos),
            pos_label: item.pos_label,
            translation: item.translation,
            example_source: item.example_source,
            example_target: item.example_target,
            past_tense: None,
            past_participle: None,
            perfect: None,
            gender: item.gender,
            plural: item.plural,
            comparative: None,
            superlative: None,
            cases: Vec::new(),
            tags: item.tags,
            translations: Vec::new(),
            examples: Vec::new(),
            curated: item.curated,
            complete: false,
            enriched_from: None,
            enriched_at: None,
            enriched_with: None,
        };
        store::upsert_word(pool, &word).await?;
    }
    Ok(count)
}
