//! # Wortschatz
//!
//! A provider-driven enrichment and reconciliation engine for a German
//! vocabulary trainer.
//!
//! For each stored word (lemma + part of speech), Wortschatz collects
//! candidate translations, example sentence pairs, and morphological forms
//! from pluggable providers, merges them with the stored record under
//! deterministic precedence and deduplication rules, computes a minimal
//! field-level patch, and keeps versioned per-provider snapshots so
//! successive runs can be diffed.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │ Providers │──▶│ Collector │──▶│  Snapshot  │──▶│  Merge/  │
//! │ dictfile  │   │ normalize │   │  Recorder  │   │  Patch   │
//! │ ai        │   │ + dedup   │   │ DB + files │   │  Engine  │
//! └───────────┘   └───────────┘   └─────┬──────┘   └────┬─────┘
//!                                       │               │
//!                                  ┌────▼─────┐    ┌────▼─────┐
//!                                  │  Mirror  │    │  SQLite  │
//!                                  │ (S3/noop)│    │  words   │
//!                                  └──────────┘    └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Dedup keys and classification helpers |
//! | [`providers`] | Provider adapter trait and registry |
//! | [`collect`] | Suggestion collector |
//! | [`snapshot`] | Snapshot recorder and change detection |
//! | [`provider_file`] | Versioned per-(pos, provider) files |
//! | [`mirror`] | Optional remote object-store mirror |
//! | [`merge`] | Merge/patch engine |
//! | [`morphology`] | POS-specific candidate selection |
//! | [`pipeline`] | Run orchestration |
//! | [`report`] | Run reports and apply backups |
//! | [`store`] | SQLite persistence boundary |

pub mod adapter_ai;
pub mod adapter_dictfile;
pub mod collect;
pub mod config;
pub mod db;
pub mod merge;
pub mod migrate;
pub mod mirror;
pub mod models;
pub mod morphology;
pub mod normalize;
pub mod pipeline;
pub mod provider_file;
pub mod providers;
pub mod report;
pub mod snapshot;
pub mod store;
