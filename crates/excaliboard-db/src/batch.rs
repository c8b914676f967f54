use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use excaliboard_types::ViewState;
use excaliboard_types::store::{ChangeKind, Collection, StoreChange};

use crate::error::Result;
use crate::records::Record;

/// A group of store operations on one connection.
///
/// Obtained from [`crate::Database::batch`] (one transaction) or
/// [`crate::Database::read`]. Writes are recorded for the change feed;
/// reads record the collections they touched.
pub struct Batch<'c> {
    conn: &'c Connection,
    changes: Vec<StoreChange>,
    touched: HashSet<Collection>,
}

impl<'c> Batch<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            changes: Vec::new(),
            touched: HashSet::new(),
        }
    }

    pub(crate) fn finish(self) -> (Vec<StoreChange>, HashSet<Collection>) {
        (self.changes, self.touched)
    }

    fn changed(&mut self, collection: Collection, kind: ChangeKind, id: &str) {
        self.changes.push(StoreChange {
            collection,
            kind,
            id: id.to_string(),
        });
    }

    // -- Writes --

    /// Insert or overwrite by primary key.
    pub fn put<R: Record>(&mut self, record: &R) -> Result<()> {
        record.upsert(self.conn)?;
        self.changed(R::COLLECTION, ChangeKind::Put, record.id());
        Ok(())
    }

    /// Remove by primary key. Returns whether a record existed; an absent
    /// id is not an error.
    pub fn delete<R: Record>(&mut self, id: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", R::table());
        let removed = self.conn.prepare_cached(&sql)?.execute([id])? > 0;
        if removed {
            self.changed(R::COLLECTION, ChangeKind::Delete, id);
        }
        Ok(removed)
    }

    /// Set the name of an existing record. Returns false if `id` is absent.
    pub fn rename<R: Record>(&mut self, id: &str, name: &str) -> Result<bool> {
        let sql = format!("UPDATE {} SET name = ?2 WHERE id = ?1", R::table());
        let updated = self.conn.prepare_cached(&sql)?.execute(params![id, name])? > 0;
        if updated {
            self.changed(R::COLLECTION, ChangeKind::Update, id);
        }
        Ok(updated)
    }

    /// Store a canvas snapshot on an existing board.
    ///
    /// `updated_at` becomes `now`, or one past the previous value if the
    /// clock has not moved, so every save advances it. Returns the new
    /// value, or `None` if the board does not exist.
    pub fn save_canvas(
        &mut self,
        id: &str,
        content: &[Value],
        app_state: &ViewState,
        now: i64,
    ) -> Result<Option<i64>> {
        let content = serde_json::to_string(content)?;
        let app_state = serde_json::to_string(app_state)?;

        let updated_at: Option<i64> = self
            .conn
            .prepare_cached(
                "UPDATE boards
                 SET content = ?2, app_state = ?3, updated_at = MAX(?4, updated_at + 1)
                 WHERE id = ?1
                 RETURNING updated_at",
            )?
            .query_row(params![id, content, app_state, now], |row| row.get(0))
            .optional()?;

        if updated_at.is_some() {
            self.changed(Collection::Boards, ChangeKind::Update, id);
        }
        Ok(updated_at)
    }

    // -- Reads --

    pub fn get<R: Record>(&mut self, id: &str) -> Result<Option<R>> {
        self.touched.insert(R::COLLECTION);
        let sql = format!("SELECT {} FROM {} WHERE id = ?1", R::COLUMNS, R::table());
        let record = self
            .conn
            .prepare_cached(&sql)?
            .query_row([id], R::from_row)
            .optional()?;
        Ok(record)
    }

    /// All records whose containment column equals `value`, in insertion
    /// order.
    pub fn query_by_index<R: Record>(&mut self, value: &str) -> Result<Vec<R>> {
        self.touched.insert(R::COLLECTION);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY rowid",
            R::COLUMNS,
            R::table(),
            R::INDEX_COLUMN
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map([value], R::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of records whose containment column equals `value`.
    pub fn count<R: Record>(&mut self, value: &str) -> Result<u64> {
        self.touched.insert(R::COLLECTION);
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            R::table(),
            R::INDEX_COLUMN
        );
        let count: i64 = self.conn.prepare_cached(&sql)?.query_row([value], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// Ids of the records in one container, without decoding payloads.
    pub fn ids_by_index<R: Record>(&mut self, value: &str) -> Result<Vec<String>> {
        self.touched.insert(R::COLLECTION);
        let sql = format!(
            "SELECT id FROM {} WHERE {} = ?1 ORDER BY rowid",
            R::table(),
            R::INDEX_COLUMN
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map([value], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
