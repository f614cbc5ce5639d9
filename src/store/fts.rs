//! Full-text index over person fields, backed by SQLite FTS5.
//!
//! Kept in sync explicitly from Rust rather than via SQL triggers: every writer that
//! touches a person row calls `upsert`/`delete` inside the same transaction as the
//! person write, satisfying "the FTS index has exactly one row per person" and "a
//! search never sees a person whose base row isn't yet present" (spec.md §3, §8).

use super::error::StoreResult;
use sea_orm::{ConnectionTrait, Statement};

pub struct FtsEntry<'a> {
    pub person_id: &'a str,
    pub display_name: &'a str,
    pub birth_name: &'a str,
    pub aliases: &'a str,
    pub bio: &'a str,
    pub occupations: &'a str,
}

pub async fn upsert<C: ConnectionTrait>(conn: &C, entry: FtsEntry<'_>) -> StoreResult<()> {
    delete(conn, entry.person_id).await?;
    conn.execute(Statement::from_sql_and_values(
        conn.get_database_backend(),
        "INSERT INTO person_fts (person_id, display_name, birth_name, aliases, bio, occupations) \
         VALUES (?, ?, ?, ?, ?, ?)",
        [
            entry.person_id.into(),
            entry.display_name.into(),
            entry.birth_name.into(),
            entry.aliases.into(),
            entry.bio.into(),
            entry.occupations.into(),
        ],
    ))
    .await?;
    Ok(())
}

pub async fn delete<C: ConnectionTrait>(conn: &C, person_id: &str) -> StoreResult<()> {
    conn.execute(Statement::from_sql_and_values(
        conn.get_database_backend(),
        "DELETE FROM person_fts WHERE person_id = ?",
        [person_id.into()],
    ))
    .await?;
    Ok(())
}

/// Runs a full-text query, returning matching `person_id`s ranked by relevance.
pub async fn search<C: ConnectionTrait>(conn: &C, query: &str, limit: u64) -> StoreResult<Vec<String>> {
    let sanitized = sanitize_match_query(query);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }

    let rows = conn
        .query_all(Statement::from_sql_and_values(
            conn.get_database_backend(),
            "SELECT person_id FROM person_fts WHERE person_fts MATCH ? ORDER BY rank LIMIT ?",
            [sanitized.into(), (limit as i64).into()],
        ))
        .await?;

    rows.into_iter()
        .map(|row| row.try_get::<String>("", "person_id").map_err(Into::into))
        .collect()
}

/// FTS5 `MATCH` treats most punctuation as syntax; quote each term so arbitrary names
/// (accents, apostrophes) are searched literally instead of raising a syntax error.
fn sanitize_match_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn exact_display_name_search_finds_person() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("t.db"), dir.path().join("blobs")).await.unwrap();
        store.create_person("p1", "Jean Dupont").await.unwrap();

        let hits = search(store.conn(), "Jean Dupont", 10).await.unwrap();
        assert_eq!(hits, vec!["p1".to_string()]);
    }
}
