//! End-to-end pipeline tests: import → preview → apply → re-run, plus the
//! provider-file schema upgrade path.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use wortschatz::config::{load_config, Config};
use wortschatz::models::{PartOfSpeech, RunMode, Scope, Word, WordFilter};
use wortschatz::pipeline::{self, RunOptions};
use wortschatz::providers::ProviderRegistry;
use wortschatz::provider_file::CURRENT_SCHEMA_VERSION;
use wortschatz::{db, migrate, mirror, store};

fn setup_test_env() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    write_dictionary(&root.join("data/dictionary.json"));

    let config_content = format!(
        r#"[db]
path = "{root}/data/wortschatz.sqlite"

[run]
target_lang = "en"
delay_ms = 0
report_dir = "{root}/data/reports"
backup_dir = "{root}/data/backups"

[files]
dir = "{root}/data/providers"

[providers]
order = ["dictfile"]

[providers.dictfile]
path = "{root}/data/dictionary.json"
"#,
        root = root.display()
    );

    let config_path = root.join("config/wort.toml");
    fs::write(&config_path, config_content).unwrap();
    let config = load_config(&config_path).unwrap();

    (tmp, config)
}

fn write_dictionary(path: &Path) {
    let dictionary = serde_json::json!({
        "apfel": {
            "noun": {
                "translations": [
                    { "value": "apple", "language": "en", "confidence": 0.98 }
                ],
                "examples": [{
                    "source_sentence": "Der Apfel ist rot.",
                    "target_sentence": "The apple is red."
                }],
                "forms": {
                    "kind": "noun",
                    "genders": ["der"],
                    "plurals": ["Äpfel"]
                },
                "tags": ["food"],
                "pos_label": "Substantiv"
            }
        },
        "abbiegen": {
            "verb": {
                "translations": [
                    { "value": "to turn", "language": "en" },
                    { "value": "abzweigen", "language": "de" }
                ],
                "examples": [{
                    "source_sentence": "Wir biegen links ab.",
                    "target_sentence": "We turn left."
                }],
                "forms": {
                    "kind": "verb",
                    "past_tense": "bog ab",
                    "past_participle": "abgebogen",
                    "perfect_options": ["hat abgebogen", "ist abgebogen"],
                    "auxiliaries": ["haben", "sein"]
                }
            }
        }
    });
    fs::write(path, serde_json::to_string_pretty(&dictionary).unwrap()).unwrap();
}

fn seed_word(lemma: &str, pos: PartOfSpeech) -> Word {
    Word {
        id: Uuid::new_v4().to_string(),
        lemma: lemma.to_string(),
        pos,
        pos_label: None,
        translation: None,
        example_source: None,
        example_target: None,
        past_tense: None,
        past_participle: None,
        perfect: None,
        gender: None,
        plural: None,
        comparative: None,
        superlative: None,
        cases: Vec::new(),
        tags: Vec::new(),
        translations: Vec::new(),
        examples: Vec::new(),
        curated: false,
        complete: false,
        enriched_from: None,
        enriched_at: None,
        enriched_with: None,
    }
}

fn run_options(mode: RunMode) -> RunOptions {
    RunOptions {
        mode,
        trigger: "manual".to_string(),
        filter: WordFilter {
            scope: Scope::All,
            incomplete_only: false,
            pos: None,
            limit: None,
        },
        allow_overwrite: false,
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn preview_then_apply_then_idempotent_rerun() {
    let (_tmp, config) = setup_test_env();
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let apfel = seed_word("Apfel", PartOfSpeech::Noun);
    let abbiegen = seed_word("abbiegen", PartOfSpeech::Verb);
    store::upsert_word(&pool, &apfel).await.unwrap();
    store::upsert_word(&pool, &abbiegen).await.unwrap();

    let registry = ProviderRegistry::from_config(&config).unwrap();
    let sink = mirror::create_sink(None);

    // ---- Preview: snapshots recorded, nothing else written ----
    let outcome = pipeline::run(&config, &pool, &registry, sink.as_ref(), &run_options(RunMode::Preview))
        .await
        .unwrap();
    assert_eq!(outcome.report.totals.scanned, 2);
    assert_eq!(outcome.report.totals.proposed_updates, 2);
    assert_eq!(outcome.report.totals.applied, 0);
    assert!(outcome.backup_path.is_none());
    assert!(outcome.report_path.is_file());

    let untouched = store::get_word(&pool, &apfel.id).await.unwrap().unwrap();
    assert!(untouched.translation.is_none());
    assert!(!untouched.complete);

    assert_eq!(
        store::snapshot_count(&pool, &apfel.id, "dictfile").await.unwrap(),
        1
    );
    assert!(list_files(&config.files.dir).is_empty());

    // ---- Apply: words updated, provider files and backup written ----
    let outcome = pipeline::run(&config, &pool, &registry, sink.as_ref(), &run_options(RunMode::Apply))
        .await
        .unwrap();
    assert_eq!(outcome.report.totals.applied, 2);
    assert!(outcome.backup_path.as_ref().unwrap().is_file());

    let enriched = store::get_word(&pool, &apfel.id).await.unwrap().unwrap();
    assert_eq!(enriched.translation.as_deref(), Some("apple"));
    assert_eq!(enriched.gender.as_deref(), Some("der"));
    assert_eq!(enriched.plural.as_deref(), Some("Äpfel"));
    assert_eq!(enriched.pos_label.as_deref(), Some("Substantiv"));
    assert_eq!(enriched.example_source.as_deref(), Some("Der Apfel ist rot."));
    assert_eq!(enriched.example_target.as_deref(), Some("The apple is red."));
    assert_eq!(enriched.translations.len(), 1);
    assert_eq!(enriched.examples.len(), 1);
    assert_eq!(enriched.enriched_from.as_deref(), Some("dictfile"));
    assert!(enriched.enriched_at.is_some());
    assert!(enriched.complete);

    let verb = store::get_word(&pool, &abbiegen.id).await.unwrap().unwrap();
    assert_eq!(verb.past_tense.as_deref(), Some("bog ab"));
    assert_eq!(verb.past_participle.as_deref(), Some("abgebogen"));
    // Ambiguous perfect options: derived from the composite auxiliary.
    assert_eq!(
        verb.perfect.as_deref(),
        Some("hat abgebogen / ist abgebogen")
    );
    // "abzweigen" is tagged de, so the en candidate becomes primary.
    assert_eq!(verb.translation.as_deref(), Some("to turn"));
    assert!(verb.complete);

    // Snapshot payload unchanged between preview and apply.
    let latest = store::latest_snapshot(&pool, &apfel.id, "dictfile")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.mode, "apply");
    assert!(!latest.has_changes);

    let files = list_files(&config.files.dir);
    assert_eq!(files.len(), 2); // noun-dictfile.json + verb-dictfile.json
    let noun_file: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(noun_file["schemaVersion"], CURRENT_SCHEMA_VERSION);
    assert!(noun_file["entries"]["apfel"].is_object());

    // ---- Re-run apply: idempotent, nothing proposed ----
    let outcome = pipeline::run(&config, &pool, &registry, sink.as_ref(), &run_options(RunMode::Apply))
        .await
        .unwrap();
    assert_eq!(outcome.report.totals.scanned, 2);
    assert_eq!(outcome.report.totals.proposed_updates, 0);
    assert_eq!(outcome.report.totals.applied, 0);
}

#[tokio::test]
async fn apply_upgrades_legacy_provider_file_in_place() {
    let (_tmp, config) = setup_test_env();
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    store::upsert_word(&pool, &seed_word("Apfel", PartOfSpeech::Noun))
        .await
        .unwrap();

    // Seed a v0-era file with an unrelated lemma.
    fs::create_dir_all(&config.files.dir).unwrap();
    let legacy = serde_json::json!({
        "schemaVersion": 0,
        "providerId": "dictfile",
        "pos": "noun",
        "updatedAt": "2024-01-01T00:00:00Z",
        "entries": {
            "birne": ["pear"]
        }
    });
    fs::write(
        config.files.dir.join("noun-dictfile.json"),
        serde_json::to_string_pretty(&legacy).unwrap(),
    )
    .unwrap();

    let registry = ProviderRegistry::from_config(&config).unwrap();
    let sink = mirror::create_sink(None);
    pipeline::run(&config, &pool, &registry, sink.as_ref(), &run_options(RunMode::Apply))
        .await
        .unwrap();

    let upgraded: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(config.files.dir.join("noun-dictfile.json")).unwrap(),
    )
    .unwrap();

    assert_eq!(upgraded["schemaVersion"], CURRENT_SCHEMA_VERSION);
    let previous: Vec<u64> = upgraded["meta"]["previousSchemaVersions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    assert!(previous.contains(&0));
    assert!(upgraded["meta"]["lastUpgradedAt"].is_string());

    // The legacy lemma survives, reshaped to the current translation shape.
    assert_eq!(
        upgraded["entries"]["birne"]["translations"][0],
        serde_json::json!({ "value": "pear", "source": "dictfile" })
    );
    // And the new lemma was upserted alongside it.
    assert!(upgraded["entries"]["apfel"].is_object());
}

#[tokio::test]
async fn filters_limit_the_selection() {
    let (_tmp, config) = setup_test_env();
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let mut curated = seed_word("Apfel", PartOfSpeech::Noun);
    curated.curated = true;
    store::upsert_word(&pool, &curated).await.unwrap();
    store::upsert_word(&pool, &seed_word("abbiegen", PartOfSpeech::Verb))
        .await
        .unwrap();

    let registry = ProviderRegistry::from_config(&config).unwrap();
    let sink = mirror::create_sink(None);

    let mut opts = run_options(RunMode::Preview);
    opts.filter.scope = Scope::Uncurated;
    let outcome = pipeline::run(&config, &pool, &registry, sink.as_ref(), &opts)
        .await
        .unwrap();
    assert_eq!(outcome.report.totals.scanned, 1);
    assert_eq!(outcome.report.entries[0].lemma, "abbiegen");

    let mut opts = run_options(RunMode::Preview);
    opts.filter.pos = Some(vec![PartOfSpeech::Noun]);
    let outcome = pipeline::run(&config, &pool, &registry, sink.as_ref(), &opts)
        .await
        .unwrap();
    assert_eq!(outcome.report.totals.scanned, 1);
    assert_eq!(outcome.report.entries[0].lemma, "Apfel");

    let mut opts = run_options(RunMode::Preview);
    opts.filter.limit = Some(1);
    let outcome = pipeline::run(&config, &pool, &registry, sink.as_ref(), &opts)
        .await
        .unwrap();
    assert_eq!(outcome.report.totals.scanned, 1);
}

#[tokio::test]
async fn missing_dictionary_is_an_isolated_provider_error() {
    let (_tmp, config) = setup_test_env();
    fs::remove_file(
        config
            .providers
            .dictfile
            .as_ref()
            .unwrap()
            .path
            .clone(),
    )
    .unwrap();

    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    store::upsert_word(&pool, &seed_word("Apfel", PartOfSpeech::Noun))
        .await
        .unwrap();

    let registry = ProviderRegistry::from_config(&config).unwrap();
    let sink = mirror::create_sink(None);
    let outcome = pipeline::run(&config, &pool, &registry, sink.as_ref(), &run_options(RunMode::Preview))
        .await
        .unwrap();

    // The run completes; the failure is a per-word diagnostic.
    assert_eq!(outcome.report.totals.scanned, 1);
    assert_eq!(outcome.report.totals.proposed_updates, 0);
    let entry = &outcome.report.entries[0];
    assert!(!entry.errors.is_empty());
    assert_eq!(entry.diagnostics.len(), 1);
}
