use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent; safe to run on every `wort init`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Words table: the canonical entry store
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS words (
            id TEXT PRIMARY KEY,
            lemma TEXT NOT NULL,
            pos TEXT NOT NULL,
            pos_label TEXT,
            translation TEXT,
            example_source TEXT,
            example_target TEXT,
            past_tense TEXT,
            past_participle TEXT,
            perfect TEXT,
            gender TEXT,
            plural TEXT,
            comparative TEXT,
            superlative TEXT,
            cases_json TEXT NOT NULL DEFAULT '[]',
            tags_json TEXT NOT NULL DEFAULT '[]',
            translations_json TEXT NOT NULL DEFAULT '[]',
            examples_json TEXT NOT NULL DEFAULT '[]',
            curated INTEGER NOT NULL DEFAULT 0,
            complete INTEGER NOT NULL DEFAULT 0,
            enriched_from TEXT,
            enriched_at INTEGER,
            enriched_with TEXT,
            UNIQUE(lemma, pos)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Snapshots table: append-only provider history
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            id TEXT PRIMARY KEY,
            word_id TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            status TEXT NOT NULL,
            error TEXT,
            payload_json TEXT NOT NULL,
            raw_json TEXT,
            collected_at INTEGER NOT NULL,
            trigger_kind TEXT NOT NULL,
            mode TEXT NOT NULL,
            has_changes INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (word_id) REFERENCES words(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_words_pos ON words(pos)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_words_complete ON words(complete)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_pair \
         ON snapshots(word_id, provider_id, collected_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
