//! SQLite persistence boundary.
//!
//! Filtered/paginated reads over the `words` table, transactional patch
//! application, and the strictly-append snapshot store. The merge engine
//! never touches this module; it receives [`Word`]s and produces
//! [`Patch`](crate::merge::Patch)es, which are applied here.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::merge::Patch;
use crate::models::{
    Example, PartOfSpeech, Scope, SnapshotRow, Translation, Word, WordFilter,
};

/// Select words matching the run filters, ordered by lemma for deterministic
/// processing.
pub async fn select_words(pool: &SqlitePool, filter: &WordFilter) -> Result<Vec<Word>> {
    let mut sql = String::from("SELECT * FROM words WHERE 1=1");

    match filter.scope {
        Scope::All => {}
        Scope::Curated => sql.push_str(" AND curated = 1"),
        Scope::Uncurated => sql.push_str(" AND curated = 0"),
    }
    if filter.incomplete_only {
        sql.push_str(" AND complete = 0");
    }
    if let Some(ref pos_list) = filter.pos {
        let placeholders = vec!["?"; pos_list.len()].join(", ");
        sql.push_str(&format!(" AND pos IN ({})", placeholders));
    }
    sql.push_str(" ORDER BY lemma, pos");
    if filter.limit.is_some() {
        sql.push_str(" LIMIT ?");
    }

    let mut query = sqlx::query(&sql);
    if let Some(ref pos_list) = filter.pos {
        for pos in pos_list {
            query = query.bind(pos.code());
        }
    }
    if let Some(limit) = filter.limit {
        query = query.bind(limit);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(row_to_word).collect()
}

/// Insert or update a word keyed by `(lemma, pos)`. Used by `wort import`
/// and the test fixtures; enrichment itself only goes through
/// [`apply_patch`].
pub async fn upsert_word(pool: &SqlitePool, word: &Word) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO words (
            id, lemma, pos, pos_label, translation, example_source, example_target,
            past_tense, past_participle, perfect, gender, plural, comparative, superlative,
            cases_json, tags_json, translations_json, examples_json,
            curated, complete, enriched_from, enriched_at, enriched_with
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(lemma, pos) DO UPDATE SET
            pos_label = excluded.pos_label,
            translation = excluded.translation,
            example_source = excluded.example_source,
            example_target = excluded.example_target,
            past_tense = excluded.past_tense,
            past_participle = excluded.past_participle,
            perfect = excluded.perfect,
            gender = excluded.gender,
            plural = excluded.plural,
            comparative = excluded.comparative,
            superlative = excluded.superlative,
            cases_json = excluded.cases_json,
            tags_json = excluded.tags_json,
            translations_json = excluded.translations_json,
            examples_json = excluded.examples_json,
            curated = excluded.curated,
            complete = excluded.complete,
            enriched_from = excluded.enriched_from,
            enriched_at = excluded.enriched_at,
            enriched_with = excluded.enriched_with
        "#,
    )
    .bind(&word.id)
    .bind(&word.lemma)
    .bind(word.pos.code())
    .bind(&word.pos_label)
    .bind(&word.translation)
    .bind(&word.example_source)
    .bind(&word.example_target)
    .bind(&word.past_tense)
    .bind(&word.past_participle)
    .bind(&word.perfect)
    .bind(&word.gender)
    .bind(&word.plural)
    .bind(&word.comparative)
    .bind(&word.superlative)
    .bind(serde_json::to_string(&word.cases)?)
    .bind(serde_json::to_string(&word.tags)?)
    .bind(serde_json::to_string(&word.translations)?)
    .bind(serde_json::to_string(&word.examples)?)
    .bind(word.curated as i64)
    .bind(word.complete as i64)
    .bind(&word.enriched_from)
    .bind(word.enriched_at.map(|t| t.timestamp()))
    .bind(&word.enriched_with)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a single word by id.
pub async fn get_word(pool: &SqlitePool, id: &str) -> Result<Option<Word>> {
    let row = sqlx::query("SELECT * FROM words WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_word).transpose()
}

/// Apply a patch to one word inside its own transaction.
///
/// Only the fields present in the patch are written; a failure rolls back
/// this word's update without affecting earlier, already-committed words.
pub async fn apply_patch(pool: &SqlitePool, word_id: &str, patch: &Patch) -> Result<()> {
    if patch.is_empty() {
        return Ok(());
    }

    let mut assignments = Vec::new();
    for field in patch.fields() {
        let column = column_for(&field)
            .ok_or_else(|| anyhow::anyhow!("Unknown patch field: '{}'", field))?;
        assignments.push(format!("{} = ?", column));
    }
    let sql = format!(
        "UPDATE words SET {} WHERE id = ?",
        assignments.join(", ")
    );

    let mut tx = pool.begin().await?;
    let mut query = sqlx::query(&sql);
    for field in patch.fields() {
        let value = patch.get(&field).cloned().unwrap_or(serde_json::Value::Null);
        query = bind_patch_value(query, &field, value)?;
    }
    let result = query.bind(word_id).execute(&mut *tx).await?;
    if result.rows_affected() == 0 {
        bail!("No word row with id '{}'", word_id);
    }
    tx.commit().await?;

    Ok(())
}

/// Map a patch field name to its column.
fn column_for(field: &str) -> Option<&'static str> {
    Some(match field {
        "pos_label" => "pos_label",
        "translation" => "translation",
        "example_source" => "example_source",
        "example_target" => "example_target",
        "past_tense" => "past_tense",
        "past_participle" => "past_participle",
        "perfect" => "perfect",
        "gender" => "gender",
        "plural" => "plural",
        "comparative" => "comparative",
        "superlative" => "superlative",
        "cases" => "cases_json",
        "tags" => "tags_json",
        "translations" => "translations_json",
        "examples" => "examples_json",
        "complete" => "complete",
        "enriched_from" => "enriched_from",
        "enriched_at" => "enriched_at",
        "enriched_with" => "enriched_with",
        _ => return None,
    })
}

type SqliteQuery<'q> =
    sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_patch_value<'q>(
    query: SqliteQuery<'q>,
    field: &str,
    value: serde_json::Value,
) -> Result<SqliteQuery<'q>> {
    use serde_json::Value;
    Ok(match field {
        // Array fields are stored as JSON text
        "cases" | "tags" | "translations" | "examples" => {
            query.bind(serde_json::to_string(&value)?)
        }
        "complete" => match value {
            Value::Bool(b) => query.bind(b as i64),
            other => bail!("Patch field 'complete' must be a bool, got {}", other),
        },
        "enriched_at" => match value {
            Value::String(s) => {
                let ts = DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| anyhow::anyhow!("Bad enriched_at timestamp: {}", e))?;
                query.bind(ts.timestamp())
            }
            Value::Null => query.bind(Option::<i64>::None),
            other => bail!("Patch field 'enriched_at' must be a string, got {}", other),
        },
        _ => match value {
            Value::String(s) => query.bind(s),
            Value::Null => query.bind(Option::<String>::None),
            other => bail!("Patch field '{}' must be a string, got {}", field, other),
        },
    })
}

// ============ Snapshot store ============

/// Append one snapshot row. Never updates existing rows.
pub async fn insert_snapshot(pool: &SqlitePool, row: &SnapshotRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO snapshots (
            id, word_id, provider_id, status, error, payload_json, raw_json,
            collected_at, trigger_kind, mode, has_changes
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.word_id)
    .bind(&row.provider_id)
    .bind(&row.status)
    .bind(&row.error)
    .bind(&row.payload_json)
    .bind(&row.raw_json)
    .bind(row.collected_at)
    .bind(&row.trigger)
    .bind(&row.mode)
    .bind(row.has_changes as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// The single most recent snapshot for `(word_id, provider_id)`.
///
/// Callers fetch this *before* inserting the new row, so the result is
/// always strictly prior to the snapshot being recorded.
pub async fn latest_snapshot(
    pool: &SqlitePool,
    word_id: &str,
    provider_id: &str,
) -> Result<Option<SnapshotRow>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM snapshots
        WHERE word_id = ? AND provider_id = ?
        ORDER BY collected_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(word_id)
    .bind(provider_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| SnapshotRow {
        id: r.get("id"),
        word_id: r.get("word_id"),
        provider_id: r.get("provider_id"),
        status: r.get("status"),
        error: r.get("error"),
        payload_json: r.get("payload_json"),
        raw_json: r.get("raw_json"),
        collected_at: r.get("collected_at"),
        trigger: r.get("trigger_kind"),
        mode: r.get("mode"),
        has_changes: r.get::<i64, _>("has_changes") != 0,
    }))
}

/// Count of snapshot rows for one `(word, provider)` pair.
pub async fn snapshot_count(
    pool: &SqlitePool,
    word_id: &str,
    provider_id: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM snapshots WHERE word_id = ? AND provider_id = ?",
    )
    .bind(word_id)
    .bind(provider_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

// ============ Row mapping ============

fn row_to_word(row: &sqlx::sqlite::SqliteRow) -> Result<Word> {
    // Malformed stored JSON degrades to an empty collection rather than
    // aborting the run.
    fn json_vec<T: serde::de::DeserializeOwned>(raw: String) -> Vec<T> {
        serde_json::from_str(&raw).unwrap_or_default()
    }

    let enriched_at: Option<i64> = row.get("enriched_at");

    Ok(Word {
        id: row.get("id"),
        lemma: row.get("lemma"),
        pos: PartOfSpeech::from_code(row.get::<String, _>("pos").as_str()),
        pos_label: row.get("pos_label"),
        translation: row.get("translation"),
        example_source: row.get("example_source"),
        example_target: row.get("example_target"),
        past_tense: row.get("past_tense"),
        past_participle: row.get("past_participle"),
        perfect: row.get("perfect"),
        gender: row.get("gender"),
        plural: row.get("plural"),
        comparative: row.get("comparative"),
        superlative: row.get("superlative"),
        cases: json_vec(row.get("cases_json")),
        tags: json_vec(row.get("tags_json")),
        translations: json_vec::<Translation>(row.get("translations_json")),
        examples: json_vec::<Example>(row.get("examples_json")),
        curated: row.get::<i64, _>("curated") != 0,
        complete: row.get::<i64, _>("complete") != 0,
        enriched_from: row.get("enriched_from"),
        enriched_at: enriched_at.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        enriched_with: row.get("enriched_with"),
    })
}
