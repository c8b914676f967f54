use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::de::DeserializeOwned;

use excaliboard_types::store::Collection;
use excaliboard_types::{Board, Folder};

use crate::error::Result;

/// A record type stored in one collection.
///
/// Every collection has a text primary key `id`, a `name`, and one
/// containment index column (the parent folder id or `"root"`).
pub trait Record: Sized {
    const COLLECTION: Collection;
    /// Indexed containment column.
    const INDEX_COLUMN: &'static str;
    /// Select list matching [`Record::from_row`].
    const COLUMNS: &'static str;

    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Insert or overwrite by primary key. An overwrite keeps the record's
    /// original insertion position.
    fn upsert(&self, conn: &Connection) -> Result<()>;

    fn table() -> &'static str {
        Self::COLLECTION.as_str()
    }
}

impl Record for Folder {
    const COLLECTION: Collection = Collection::Folders;
    const INDEX_COLUMN: &'static str = "parent_id";
    const COLUMNS: &'static str = "id, name, parent_id, created_at";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Folder {
            id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn upsert(&self, conn: &Connection) -> Result<()> {
        conn.prepare_cached(
            "INSERT INTO folders (id, name, parent_id, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                parent_id = excluded.parent_id,
                created_at = excluded.created_at",
        )?
        .execute(params![self.id, self.name, self.parent_id, self.created_at])?;
        Ok(())
    }
}

impl Record for Board {
    const COLLECTION: Collection = Collection::Boards;
    const INDEX_COLUMN: &'static str = "folder_id";
    const COLUMNS: &'static str = "id, name, folder_id, content, app_state, created_at, updated_at";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let app_state: Option<String> = row.get(4)?;
        Ok(Board {
            id: row.get(0)?,
            name: row.get(1)?,
            folder_id: row.get(2)?,
            content: json_column(row, 3)?,
            app_state: app_state
                .map(|raw| decode_json(4, &raw))
                .transpose()?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn upsert(&self, conn: &Connection) -> Result<()> {
        let content = serde_json::to_string(&self.content)?;
        let app_state = self.app_state.as_ref().map(serde_json::to_string).transpose()?;

        conn.prepare_cached(
            "INSERT INTO boards (id, name, folder_id, content, app_state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                folder_id = excluded.folder_id,
                content = excluded.content,
                app_state = excluded.app_state,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
        )?
        .execute(params![
            self.id,
            self.name,
            self.folder_id,
            content,
            app_state,
            self.created_at,
            self.updated_at,
        ])?;
        Ok(())
    }
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    decode_json(idx, &raw)
}

fn decode_json<T: DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
