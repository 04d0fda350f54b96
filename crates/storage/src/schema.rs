use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS expedients (
    space INTEGER NOT NULL CHECK (space IN (0, 1)),
    id INTEGER NOT NULL CHECK (id >= 0),
    created_at INTEGER NOT NULL,
    newest_at INTEGER NOT NULL,
    body BLOB NOT NULL,
    PRIMARY KEY (space, id)
);
CREATE INDEX IF NOT EXISTS idx_expedients_newest ON expedients (newest_at);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() -> Result<(), StorageError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        init_schema(&conn)?;
        let version: i32 =
            conn.query_row("SELECT max(version) FROM schema_version", [], |row| row.get(0))?;
        assert_eq!(version, SCHEMA_VERSION);
        Ok(())
    }
}
