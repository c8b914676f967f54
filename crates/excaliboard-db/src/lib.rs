pub mod batch;
pub mod error;
pub mod migrations;
pub mod queries;
pub mod records;

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tokio::sync::broadcast;
use tracing::{info, trace};

use excaliboard_types::store::{Collection, StoreChange};

pub use batch::Batch;
pub use error::{Result, StorageFault};
pub use records::Record;

/// Capacity of the change feed. Observers that fall further behind than
/// this see a lag and re-read everything they depend on.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// Local workspace store: the `folders` and `boards` collections in one
/// SQLite file.
///
/// A single connection behind a mutex is the only writer, so writes are
/// applied in the order callers issue them. Every committed write is
/// published on a broadcast change feed.
pub struct Database {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL keeps readers of the file unblocked during autosave writes
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::from_connection(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private, non-persistent store. Each call is fully isolated.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// A closure that panicked poisons the mutex, but its transaction was
    /// rolled back on drop, so the connection stays usable.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run raw SQL, bypassing batches and the change feed. Lets tests
    /// install faults such as an aborting trigger.
    #[cfg(any(test, feature = "test-util"))]
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Subscribe to committed writes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Number of live change-feed receivers.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Run read operations outside a transaction.
    pub fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<T>,
    {
        self.read_tracked(f).map(|(value, _)| value)
    }

    /// Like [`Database::read`], also returning the collections the reads
    /// touched.
    pub fn read_tracked<F, T>(&self, f: F) -> Result<(T, HashSet<Collection>)>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<T>,
    {
        let conn = self.lock();
        let mut batch = Batch::new(&conn);
        let value = f(&mut batch)?;
        let (_, touched) = batch.finish();
        Ok((value, touched))
    }

    /// Run operations in one transaction. Changes are published only after
    /// the commit succeeds; an error rolls everything back.
    pub fn batch<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<T>,
    {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;

        let mut batch = Batch::new(&tx);
        let value = f(&mut batch)?;
        let (changes, _) = batch.finish();

        tx.commit()?;
        drop(conn);

        for change in changes {
            trace!(collection = change.collection.as_str(), id = %change.id, "store change");
            // No subscribers is fine
            let _ = self.changes.send(change);
        }

        Ok(value)
    }
}
