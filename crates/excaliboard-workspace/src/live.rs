use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use excaliboard_db::{Batch, Database, StorageFault};
use excaliboard_types::store::{Collection, StoreChange};

/// Latest result of a live query.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
    /// Not evaluated yet.
    Pending,
    Ready(T),
    /// The last evaluation failed; the next relevant write retries it.
    Failed(Arc<StorageFault>),
}

impl<T> QueryState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Factory for live queries over one store.
///
/// Invalidation is per collection: a write to `folders` re-runs every
/// query whose last evaluation read `folders`, whatever the record.
#[derive(Clone)]
pub struct LiveQueries {
    db: Arc<Database>,
}

impl LiveQueries {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Start observing `query`. Must be called inside a Tokio runtime.
    ///
    /// The result starts as [`QueryState::Pending`] and is replaced after
    /// the first evaluation and after every batch of writes to a
    /// collection the previous evaluation read.
    pub fn observe<T, F>(&self, query: F) -> LiveQuery<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&mut Batch<'_>) -> excaliboard_db::Result<T> + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(QueryState::Pending);
        let evaluations = Arc::new(AtomicU64::new(0));

        // Subscribe before the first read so no write falls in between.
        let feed = self.db.subscribe();

        let task = tokio::spawn(run_observer(
            self.db.clone(),
            Arc::new(query),
            feed,
            tx,
            evaluations.clone(),
        ));

        LiveQuery {
            rx,
            task,
            evaluations,
        }
    }
}

/// Handle to a running live query. Dropping it stops re-evaluation and
/// releases the change-feed subscription.
pub struct LiveQuery<T> {
    rx: watch::Receiver<QueryState<T>>,
    task: JoinHandle<()>,
    evaluations: Arc<AtomicU64>,
}

impl<T: Clone> LiveQuery<T> {
    pub fn current(&self) -> QueryState<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next result. `None` once the observer has stopped.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the first evaluation has finished.
    pub async fn settled(&mut self) -> Option<QueryState<T>> {
        let state = self.rx.wait_for(|state| !state.is_pending()).await.ok()?;
        Some(state.clone())
    }

    /// How many times the query has run.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Acquire)
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_observer<T, F>(
    db: Arc<Database>,
    query: Arc<F>,
    mut feed: broadcast::Receiver<StoreChange>,
    tx: watch::Sender<QueryState<T>>,
    evaluations: Arc<AtomicU64>,
) where
    T: Send + Sync + 'static,
    F: Fn(&mut Batch<'_>) -> excaliboard_db::Result<T> + Send + Sync + 'static,
{
    loop {
        let (db_eval, query_eval) = (db.clone(), query.clone());
        let result =
            tokio::task::spawn_blocking(move || db_eval.read_tracked(|b| (*query_eval)(b))).await;
        evaluations.fetch_add(1, Ordering::AcqRel);

        let depends_on = match result {
            Ok(Ok((value, touched))) => {
                tx.send_replace(QueryState::Ready(value));
                touched
            }
            Ok(Err(fault)) => {
                warn!("Live query failed: {}", fault);
                tx.send_replace(QueryState::Failed(Arc::new(fault)));
                // Unknown dependencies; retry on any write
                HashSet::from([Collection::Folders, Collection::Boards])
            }
            Err(e) => {
                warn!("Live query evaluation did not complete: {}", e);
                return;
            }
        };

        if !wait_for_change(&mut feed, &depends_on, &tx).await {
            debug!("Live query observer stopped");
            return;
        }
    }
}

/// Wait for a write to one of `depends_on`, then swallow every change that
/// is already queued so one batch of writes costs one re-evaluation.
/// Returns false when nobody is observing any more.
async fn wait_for_change<T>(
    feed: &mut broadcast::Receiver<StoreChange>,
    depends_on: &HashSet<Collection>,
    tx: &watch::Sender<QueryState<T>>,
) -> bool {
    loop {
        tokio::select! {
            _ = tx.closed() => return false,
            change = feed.recv() => match change {
                Ok(change) if depends_on.contains(&change.collection) => break,
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Live query lagged behind the change feed");
                    break;
                }
                Err(RecvError::Closed) => return false,
            },
        }
    }

    tokio::task::yield_now().await;
    loop {
        match feed.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use excaliboard_types::{Board, Folder, ROOT_ID};

    use super::*;

    fn board(id: &str) -> Board {
        Board {
            id: id.into(),
            name: id.into(),
            folder_id: ROOT_ID.into(),
            content: vec![],
            app_state: None,
            created_at: 1,
            updated_at: 1,
        }
    }

    fn root_boards(b: &mut Batch<'_>) -> excaliboard_db::Result<Vec<Board>> {
        b.query_by_index(ROOT_ID)
    }

    #[tokio::test]
    async fn starts_pending_then_follows_writes() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut live = LiveQueries::new(db.clone()).observe(root_boards);

        let first = live.settled().await.unwrap().ready().unwrap();
        assert!(first.is_empty());

        db.put(&board("b1")).unwrap();
        let next = live.changed().await.unwrap().ready().unwrap();
        assert_eq!(next.len(), 1);

        db.delete::<Board>("b1").unwrap();
        let after_delete = live.changed().await.unwrap().ready().unwrap();
        assert!(after_delete.is_empty());
    }

    #[tokio::test]
    async fn value_is_pending_until_first_evaluation() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut live = LiveQueries::new(db.clone()).observe(root_boards);

        // The observer task has not run yet on this single-threaded runtime
        assert!(live.current().is_pending());

        live.settled().await.unwrap();
        assert!(matches!(live.current(), QueryState::Ready(boards) if boards.is_empty()));
    }

    #[tokio::test]
    async fn failed_evaluation_is_reported_and_retried() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut live = LiveQueries::new(db.clone()).observe(|b: &mut Batch<'_>| {
            let folders = b.query_by_index::<Folder>(ROOT_ID)?;
            let boards = b.query_by_index::<Board>(ROOT_ID)?;
            Ok((folders.len(), boards.len()))
        });
        assert_eq!(live.settled().await.unwrap().ready(), Some((0, 0)));

        db.execute_raw("ALTER TABLE folders RENAME TO folders_offline;")
            .unwrap();
        db.put(&board("b1")).unwrap();
        assert!(matches!(
            live.changed().await.unwrap(),
            QueryState::Failed(_)
        ));

        db.execute_raw("ALTER TABLE folders_offline RENAME TO folders;")
            .unwrap();
        db.put(&board("b2")).unwrap();
        assert_eq!(live.changed().await.unwrap().ready(), Some((0, 2)));
    }

    #[tokio::test]
    async fn one_batch_of_writes_is_one_evaluation() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut live = LiveQueries::new(db.clone()).observe(root_boards);
        live.settled().await.unwrap();
        assert_eq!(live.evaluations(), 1);

        db.batch(|b| {
            b.put(&board("a"))?;
            b.put(&board("b"))?;
            b.put(&board("c"))
        })
        .unwrap();

        let boards = live.changed().await.unwrap().ready().unwrap();
        assert_eq!(boards.len(), 3);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(live.evaluations(), 2);
    }

    #[tokio::test]
    async fn writes_to_other_collections_are_ignored() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut live = LiveQueries::new(db.clone())
            .observe(|b: &mut Batch<'_>| b.query_by_index::<Folder>(ROOT_ID));
        live.settled().await.unwrap();

        db.put(&board("b1")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(live.evaluations(), 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_releases_the_subscription() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        assert_eq!(db.subscriber_count(), 0);

        let mut live = LiveQueries::new(db.clone()).observe(root_boards);
        live.settled().await.unwrap();
        assert_eq!(db.subscriber_count(), 1);

        drop(live);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(db.subscriber_count(), 0);
    }
}
