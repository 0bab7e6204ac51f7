use rusqlite::Connection;

use crate::error::Result;

const CREATE_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        summary TEXT NOT NULL,
        category TEXT,
        body TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        token_estimate INTEGER NOT NULL,
        updated_at TEXT NOT NULL,
        processed_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS headings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        level INTEGER NOT NULL,
        text TEXT NOT NULL,
        anchor TEXT NOT NULL,
        position INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS links (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        target TEXT NOT NULL,
        is_external INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'unknown',
        checked_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS document_tags (
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (document_id, tag_id)
    )",
    "CREATE TABLE IF NOT EXISTS concepts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS document_concepts (
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        concept_id INTEGER NOT NULL REFERENCES concepts(id) ON DELETE CASCADE,
        score REAL NOT NULL DEFAULT 1.0,
        PRIMARY KEY (document_id, concept_id)
    )",
    "CREATE TABLE IF NOT EXISTS chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        chunk_index INTEGER NOT NULL,
        heading_path TEXT NOT NULL,
        content TEXT NOT NULL,
        token_count INTEGER NOT NULL,
        vector TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS document_embeddings (
        document_id INTEGER PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
        vector TEXT NOT NULL,
        model_id TEXT NOT NULL,
        generated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS query_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        query_hash TEXT NOT NULL UNIQUE,
        query_text TEXT NOT NULL,
        result_ids TEXT NOT NULL,
        created_at TEXT NOT NULL,
        last_accessed TEXT NOT NULL,
        hit_count INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS queue_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL,
        event_type TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        status TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT
    )",
];

const CREATE_INDEX_STATEMENTS: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_path ON documents(path)",
    "CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category)",
    "CREATE INDEX IF NOT EXISTS idx_headings_document ON headings(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_links_document ON links(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_query_cache_hash ON query_cache(query_hash)",
    "CREATE INDEX IF NOT EXISTS idx_queue_events_status_created ON queue_events(status, created_at)",
];

/// Forward-compatible additive column migrations: `(table, column, ddl_type_and_default)`.
/// Applied only if the column is missing, via introspection of the current
/// columns. Columns are never dropped or renamed.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[];

/// Create all tables and indexes idempotently, enable foreign-key
/// enforcement, and apply any pending additive migrations.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    for stmt in CREATE_STATEMENTS {
        conn.execute(stmt, [])?;
    }
    for stmt in CREATE_INDEX_STATEMENTS {
        conn.execute(stmt, [])?;
    }

    apply_additive_migrations(conn)?;
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn apply_additive_migrations(conn: &Connection) -> Result<()> {
    for (table, column, ddl) in ADDITIVE_COLUMNS {
        let existing = table_columns(conn, table)?;
        if !existing.iter().any(|c| c == column) {
            conn.execute(
                &format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}"),
                [],
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        let columns = table_columns(&conn, "documents").unwrap();
        assert!(columns.contains(&"path".to_string()));
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn additive_migration_adds_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute("ALTER TABLE documents ADD COLUMN pinned INTEGER", [])
            .unwrap();
        let columns = table_columns(&conn, "documents").unwrap();
        assert!(columns.contains(&"pinned".to_string()));
    }
}
