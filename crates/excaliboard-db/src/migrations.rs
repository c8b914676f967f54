use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (folders and boards)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE folders (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                parent_id   TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_folders_parent ON folders(parent_id);
            CREATE INDEX idx_folders_created ON folders(created_at);

            CREATE TABLE boards (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                folder_id   TEXT NOT NULL,
                content     TEXT NOT NULL DEFAULT '[]',
                app_state   TEXT,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_boards_folder ON boards(folder_id);
            CREATE INDEX idx_boards_created ON boards(created_at);
            CREATE INDEX idx_boards_updated ON boards(updated_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    Ok(())
}
