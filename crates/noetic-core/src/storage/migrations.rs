//! Database Migrations
//!
//! Ordered, idempotent schema migrations applied on open. Each migration's
//! `up` SQL guards every creation with `IF NOT EXISTS` so re-applying the
//! same version twice is a no-op.

/// A single database migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial schema: memory, vec, history, checkpoints",
    up: MIGRATION_V1_UP,
}];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    spec_folder TEXT NOT NULL,
    file_path TEXT NOT NULL,
    anchor_id TEXT,
    title TEXT NOT NULL DEFAULT '',
    trigger_phrases TEXT NOT NULL DEFAULT '[]',
    content_hash TEXT NOT NULL,
    embedding_model TEXT,
    embedding_status TEXT NOT NULL DEFAULT 'pending',
    importance_weight REAL NOT NULL DEFAULT 0.5,
    importance_tier TEXT NOT NULL DEFAULT 'normal',
    context_type TEXT NOT NULL DEFAULT 'general',
    decay_half_life_days REAL NOT NULL DEFAULT 90.0,
    is_pinned INTEGER NOT NULL DEFAULT 0,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    expires_at TEXT,
    confidence REAL NOT NULL DEFAULT 1.0,
    related_memories TEXT NOT NULL DEFAULT '[]',
    channel TEXT,
    session_id TEXT,
    UNIQUE (spec_folder, file_path, anchor_id)
);

CREATE INDEX IF NOT EXISTS idx_memory_folder ON memory(spec_folder);
CREATE INDEX IF NOT EXISTS idx_memory_hash ON memory(content_hash);
CREATE INDEX IF NOT EXISTS idx_memory_tier ON memory(importance_tier);
CREATE INDEX IF NOT EXISTS idx_memory_status ON memory(embedding_status);
CREATE INDEX IF NOT EXISTS idx_memory_expires ON memory(expires_at);
CREATE INDEX IF NOT EXISTS idx_memory_context ON memory(context_type);

CREATE TABLE IF NOT EXISTS vec (
    id INTEGER PRIMARY KEY REFERENCES memory(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dim INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    memory_id INTEGER NOT NULL,
    prev_value TEXT,
    new_value TEXT,
    event TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    actor TEXT
);

CREATE INDEX IF NOT EXISTS idx_history_memory ON history(memory_id);

CREATE TABLE IF NOT EXISTS checkpoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    spec_folder TEXT,
    branch TEXT,
    memory_snapshot BLOB NOT NULL,
    file_snapshot BLOB NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// Apply every migration whose version is greater than the current
/// `schema_version`, in order. Safe to call on every open.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let current: u32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        tracing::info!(version = migration.version, description = migration.description, "applying migration");
        conn.execute_batch(migration.up)?;
    }

    if let Some(last) = MIGRATIONS.last() {
        if last.version > current {
            conn.execute("DELETE FROM schema_version", [])?;
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", rusqlite::params![last.version])?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        apply_migrations(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();

        for table in ["memory", "vec", "history", "checkpoints", "schema_version"] {
            let count: u32 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    rusqlite::params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
