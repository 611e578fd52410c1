//! SQLite implementation of the EventStore trait.
//!
//! This is the primary storage backend for Nebula history. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.
//!
//! File databases run in WAL mode: appends go through a single writer
//! connection while reads are served from a small pool of read connections,
//! so a writer waiting on the database lock never stalls readers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use nebula_history_core::{Event, EventType, InstanceId, NewEvent, RegistrationId};

use crate::append::{check_append, check_batch, InstanceHead};
use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{EventStore, Page};

const EVENT_COLUMNS: &str =
    "e.instance_id, e.seq, e.registration_id, e.event_type, e.payload, e.recorded_at";

/// Tuning for a [`SqliteStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Upper bound on one append, including time queued behind other
    /// appends and time spent waiting for the database lock. An append that
    /// runs out of time is rolled back and reported as `Unavailable`.
    pub busy_timeout: Duration,
    /// Read connections kept open between calls (file databases only).
    pub max_idle_readers: usize,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            max_idle_readers: 4,
        }
    }
}

impl SqliteConfig {
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_max_idle_readers(mut self, readers: usize) -> Self {
        self.max_idle_readers = readers;
        self
    }
}

/// SQLite-based store implementation.
///
/// All operations use spawn_blocking to avoid blocking the async runtime.
/// Appends run in an IMMEDIATE transaction on the writer connection and the
/// schema carries partial unique indexes for the lifecycle events, so the
/// invariants hold even with several processes sharing one database file.
///
/// An in-memory database has a single connection; its reads share the
/// writer.
pub struct SqliteStore {
    /// The connection every append goes through.
    writer: Arc<Mutex<Connection>>,
    /// Read connections; `None` for in-memory databases.
    readers: Option<Arc<ReaderPool>>,
    config: SqliteConfig,
}

/// Read connections to one database file.
struct ReaderPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    config: SqliteConfig,
}

impl ReaderPool {
    fn take(&self) -> Result<Connection> {
        if let Some(conn) = lock(&self.idle)?.pop() {
            return Ok(conn);
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        conn.pragma_update(None, "query_only", "ON")?;
        Ok(conn)
    }

    fn give_back(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.config.max_idle_readers {
                idle.push(conn);
            }
        }
    }
}

impl SqliteStore {
    /// Open a SQLite database at the given path with default settings.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, SqliteConfig::default())
    }

    /// Open a SQLite database at the given path.
    pub fn open_with(path: impl AsRef<Path>, config: SqliteConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.busy_timeout(config.busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(%mode, "database did not switch to WAL; reads may wait on writers");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let readers = ReaderPool {
            path,
            idle: Mutex::new(Vec::new()),
            config: config.clone(),
        };
        Self::init(conn, Some(Arc::new(readers)), config)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::init(conn, None, SqliteConfig::default())
    }

    fn init(
        mut conn: Connection,
        readers: Option<Arc<ReaderPool>>,
        config: SqliteConfig,
    ) -> Result<Self> {
        migration::migrate(&mut conn)?;
        Ok(Self {
            writer: Arc::new(Mutex::new(conn)),
            readers,
            config,
        })
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run a blocking operation on the writer connection.
    ///
    /// The deadline starts now, so time spent queued behind other appends
    /// counts against `busy_timeout`. The task always runs to completion and
    /// its outcome is what the caller sees.
    async fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let writer = Arc::clone(&self.writer);
        let deadline = Instant::now() + self.config.busy_timeout;

        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&writer)?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StoreError::Unavailable(
                    "timed out waiting for the writer connection".into(),
                ));
            }
            conn.busy_timeout(remaining)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }

    /// Run a blocking query on a read connection.
    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(readers) = self.readers.clone() else {
            return self.write(move |conn| f(conn)).await;
        };

        tokio::task::spawn_blocking(move || {
            let conn = readers.take()?;
            let result = f(&conn);
            readers.give_back(conn);
            result
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))
}

// Helper to convert a row to Event
fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let instance_id: String = row.get(0)?;
    let seq: i64 = row.get(1)?;
    let registration_id: String = row.get(2)?;
    let event_type: u16 = row.get(3)?;
    let payload: Vec<u8> = row.get(4)?;

    Ok(Event {
        sequence: seq as u64,
        registration_id: RegistrationId::parse(&registration_id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        instance_id: InstanceId::parse(&instance_id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        event_type: EventType::from_u16(event_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Integer,
                format!("unknown event type {event_type}").into(),
            )
        })?,
        payload: Bytes::from(payload),
        recorded_at: row.get(5)?,
    })
}

fn load_head(conn: &Connection, instance: &InstanceId) -> Result<InstanceHead> {
    let row: Option<(String, i64, bool, bool)> = conn
        .query_row(
            "SELECT i.registration_id,
                    (SELECT COALESCE(MAX(seq), 0) FROM events WHERE instance_id = ?1),
                    EXISTS(SELECT 1 FROM events WHERE instance_id = ?1 AND event_type = ?2),
                    EXISTS(SELECT 1 FROM events WHERE instance_id = ?1 AND event_type = ?3)
             FROM instances i WHERE i.instance_id = ?1",
            params![
                instance.as_str(),
                EventType::WorkflowScheduled.to_u16(),
                EventType::WorkflowCompleted.to_u16(),
            ],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    match row {
        None => Ok(InstanceHead::default()),
        Some((registration, last_sequence, has_scheduled, has_completed)) => Ok(InstanceHead {
            registration: Some(
                RegistrationId::parse(&registration)
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            ),
            last_sequence: last_sequence as u64,
            has_scheduled,
            has_completed,
        }),
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Lock contention is the collaborator being unavailable, not a bad request.
fn lock_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            StoreError::Unavailable(format!("database is locked: {}", err))
        }
        _ => err.into(),
    }
}

fn limit_offset(page: Page) -> (i64, i64) {
    (
        page.limit as i64,
        i64::try_from(page.offset).unwrap_or(i64::MAX),
    )
}

/// Write one event row at `sequence`.
///
/// The partial unique indexes reject a second lifecycle event even when the
/// head the sequence came from was stale.
fn insert_row(conn: &Connection, event: &NewEvent, sequence: u64, now: i64) -> Result<()> {
    let inserted = conn.execute(
        "INSERT INTO events (
            instance_id, seq, registration_id, event_type, payload, recorded_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.instance_id.as_str(),
            sequence as i64,
            event.registration_id.as_str(),
            event.event_type.to_u16(),
            event.payload.as_ref(),
            now,
        ],
    );

    match inserted {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) && event.event_type.is_lifecycle() => {
            Err(StoreError::DuplicateLifecycleEvent {
                instance: event.instance_id.clone(),
                event_type: event.event_type,
            })
        }
        Err(e) => Err(lock_error(e)),
    }
}

/// Append a batch for one instance in a single IMMEDIATE transaction.
///
/// Any rejected event rolls the whole batch back.
fn append(conn: &mut Connection, events: Vec<NewEvent>) -> Result<Vec<Event>> {
    check_batch(&events)?;
    let Some(first) = events.first() else {
        return Ok(Vec::new());
    };

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(lock_error)?;
    let mut head = load_head(&tx, &first.instance_id)?;
    let now = now_millis();
    let mut stored = Vec::with_capacity(events.len());

    for event in events {
        let sequence = check_append(&head, &event)?;

        if head.registration.is_none() {
            tx.execute(
                "INSERT INTO instances (instance_id, registration_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![event.instance_id.as_str(), event.registration_id.as_str(), now],
            )
            .map_err(lock_error)?;
        }
        insert_row(&tx, &event, sequence, now)?;

        head.record(&event, sequence);
        stored.push(event.into_event(sequence, now));
    }

    tx.commit().map_err(lock_error)?;
    Ok(stored)
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn insert_event(&self, event: NewEvent) -> Result<Event> {
        let instance = event.instance_id.clone();
        self.write(move |conn| append(conn, vec![event]))
            .await?
            .pop()
            .ok_or_else(|| StoreError::InvalidData(format!("append to {instance} stored nothing")))
    }

    async fn insert_events(&self, events: Vec<NewEvent>) -> Result<Vec<Event>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        self.write(move |conn| append(conn, events)).await
    }

    async fn list_by_instance(&self, instance: &InstanceId, page: Page) -> Result<Vec<Event>> {
        let instance = instance.clone();
        let (limit, offset) = limit_offset(page);

        self.read(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events e
                 WHERE e.instance_id = ?1
                 ORDER BY e.seq
                 LIMIT ?2 OFFSET ?3"
            ))?;

            let events = stmt
                .query_map(params![instance.as_str(), limit, offset], row_to_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(events)
        })
        .await
    }

    async fn count_by_instance(&self, instance: &InstanceId) -> Result<u64> {
        let instance = instance.clone();

        self.read(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM events WHERE instance_id = ?1",
                params![instance.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn registration_of(&self, instance: &InstanceId) -> Result<RegistrationId> {
        let instance = instance.clone();

        self.read(move |conn| {
            let registration: Option<String> = conn
                .query_row(
                    "SELECT registration_id FROM instances WHERE instance_id = ?1",
                    params![instance.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            match registration {
                Some(r) => {
                    RegistrationId::parse(&r).map_err(|e| StoreError::InvalidData(e.to_string()))
                }
                None => Err(StoreError::NotFound(instance)),
            }
        })
        .await
    }

    async fn find_completed_event(&self, instance: &InstanceId) -> Result<Option<Event>> {
        self.find_lifecycle_event(instance, EventType::WorkflowCompleted)
            .await
    }

    async fn find_scheduled_event(&self, instance: &InstanceId) -> Result<Option<Event>> {
        self.find_lifecycle_event(instance, EventType::WorkflowScheduled)
            .await
    }

    async fn count_instances_of_registration(&self, registration: &RegistrationId) -> Result<u64> {
        let registration = registration.clone();

        self.read(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM instances WHERE registration_id = ?1",
                params![registration.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn list_instances_of_registration(
        &self,
        registration: &RegistrationId,
        page: Page,
    ) -> Result<Vec<Event>> {
        let registration = registration.clone();
        let (limit, offset) = limit_offset(page);

        self.read(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM instances i
                 JOIN events e ON e.instance_id = i.instance_id AND e.seq = 1
                 WHERE i.registration_id = ?1
                 ORDER BY i.creation_order
                 LIMIT ?2 OFFSET ?3"
            ))?;

            let events = stmt
                .query_map(params![registration.as_str(), limit, offset], row_to_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(events)
        })
        .await
    }

    async fn list_events_of_registration(
        &self,
        registration: &RegistrationId,
        page: Page,
    ) -> Result<Vec<Event>> {
        let registration = registration.clone();
        let (limit, offset) = limit_offset(page);

        self.read(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM instances i
                 JOIN events e ON e.instance_id = i.instance_id
                 WHERE i.registration_id = ?1
                 ORDER BY i.creation_order, e.seq
                 LIMIT ?2 OFFSET ?3"
            ))?;

            let events = stmt
                .query_map(params![registration.as_str(), limit, offset], row_to_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(events)
        })
        .await
    }
}

impl SqliteStore {
    async fn find_lifecycle_event(
        &self,
        instance: &InstanceId,
        event_type: EventType,
    ) -> Result<Option<Event>> {
        let instance = instance.clone();

        self.read(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events e
                     WHERE e.instance_id = ?1 AND e.event_type = ?2"
                ),
                params![instance.as_str(), event_type.to_u16()],
                row_to_event,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_history_core::AccessScope;

    fn scope() -> AccessScope {
        AccessScope::new("acc1").unwrap()
    }

    fn reg(name: &str) -> RegistrationId {
        RegistrationId::new(&scope(), name).unwrap()
    }

    fn inst(name: &str) -> InstanceId {
        InstanceId::new(&scope(), name).unwrap()
    }

    fn new_event(r: &str, i: &str, event_type: EventType) -> NewEvent {
        NewEvent::new(reg(r), inst(i), event_type, format!("{i}/{event_type}").into_bytes())
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = SqliteStore::open_memory().unwrap();

        store.insert_event(new_event("r1", "i1", EventType::WorkflowScheduled)).await.unwrap();
        store.insert_event(new_event("r1", "i1", EventType::ActivityScheduled)).await.unwrap();
        let last = store
            .insert_event(new_event("r1", "i1", EventType::ActivityCompleted))
            .await
            .unwrap();
        assert_eq!(last.sequence, 3);

        let events = store.list_by_instance(&inst("i1"), Page::first(10)).await.unwrap();
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::WorkflowScheduled,
                EventType::ActivityScheduled,
                EventType::ActivityCompleted
            ]
        );
        assert_eq!(events[1].payload.as_ref(), b"i1/ActivityScheduled");
    }

    #[tokio::test]
    async fn test_lifecycle_violations() {
        let store = SqliteStore::open_memory().unwrap();

        let early = store.insert_event(new_event("r1", "i1", EventType::WorkflowCompleted)).await;
        assert!(matches!(early, Err(StoreError::OutOfOrderEvent { .. })));

        let orphan = store.insert_event(new_event("r1", "i1", EventType::TimerFired)).await;
        assert!(matches!(orphan, Err(StoreError::UnknownRegistration { .. })));

        store.insert_event(new_event("r1", "i1", EventType::WorkflowScheduled)).await.unwrap();
        let dup = store.insert_event(new_event("r1", "i1", EventType::WorkflowScheduled)).await;
        assert!(matches!(dup, Err(StoreError::DuplicateLifecycleEvent { .. })));

        assert_eq!(store.count_by_instance(&inst("i1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_registration_lookups() {
        let store = SqliteStore::open_memory().unwrap();

        assert!(matches!(
            store.registration_of(&inst("missing")).await,
            Err(StoreError::NotFound(_))
        ));

        for i in ["c", "a", "b"] {
            store.insert_event(new_event("r1", i, EventType::WorkflowScheduled)).await.unwrap();
            store.insert_event(new_event("r1", i, EventType::DecisionScheduled)).await.unwrap();
        }
        store.insert_event(new_event("r2", "z", EventType::WorkflowScheduled)).await.unwrap();

        assert_eq!(store.registration_of(&inst("a")).await.unwrap(), reg("r1"));
        assert_eq!(store.count_instances_of_registration(&reg("r1")).await.unwrap(), 3);

        let reps = store
            .list_instances_of_registration(&reg("r1"), Page::first(10))
            .await
            .unwrap();
        let locals: Vec<&str> = reps.iter().map(|e| e.instance_id.local()).collect();
        assert_eq!(locals, vec!["c", "a", "b"]);
        assert!(reps.iter().all(Event::is_scheduled));

        let all = store
            .list_events_of_registration(&reg("r1"), Page::new(1, 3))
            .await
            .unwrap();
        let order: Vec<(&str, u64)> = all
            .iter()
            .map(|e| (e.instance_id.local(), e.sequence))
            .collect();
        assert_eq!(order, vec![("c", 2), ("a", 1), ("a", 2)]);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = SqliteStore::open_memory().unwrap();

        let opened = store
            .insert_events(vec![
                new_event("r1", "i1", EventType::WorkflowScheduled),
                new_event("r1", "i1", EventType::DecisionCompleted),
            ])
            .await
            .unwrap();
        let seqs: Vec<u64> = opened.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![1, 2]);

        store.insert_event(new_event("r1", "i1", EventType::WorkflowCompleted)).await.unwrap();

        // The close is refused after the decision was accepted; neither lands.
        let result = store
            .insert_events(vec![
                new_event("r1", "i1", EventType::DecisionCompleted),
                new_event("r1", "i1", EventType::WorkflowCompleted),
            ])
            .await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateLifecycleEvent {
                event_type: EventType::WorkflowCompleted,
                ..
            })
        ));
        assert_eq!(store.count_by_instance(&inst("i1")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_batch_for_several_instances_rejected() {
        let store = SqliteStore::open_memory().unwrap();

        let result = store
            .insert_events(vec![
                new_event("r1", "i1", EventType::WorkflowScheduled),
                new_event("r1", "i2", EventType::WorkflowScheduled),
            ])
            .await;
        assert!(matches!(result, Err(StoreError::MixedBatch { .. })));
        assert_eq!(store.count_instances_of_registration(&reg("r1")).await.unwrap(), 0);
        assert!(store.insert_events(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_index_rejects_stale_append() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_event(new_event("r1", "i1", EventType::WorkflowScheduled)).await.unwrap();

        // Write at the next free sequence as a writer with a stale head would.
        let dup = new_event("r1", "i1", EventType::WorkflowScheduled);
        let result = store
            .write(move |conn| insert_row(conn, &dup, 2, now_millis()))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateLifecycleEvent {
                event_type: EventType::WorkflowScheduled,
                ..
            })
        ));
        assert_eq!(store.count_by_instance(&inst("i1")).await.unwrap(), 1);
    }

    fn file_store(path: &Path, busy_timeout: Duration) -> SqliteStore {
        let config = SqliteConfig::default().with_busy_timeout(busy_timeout);
        SqliteStore::open_with(path, config).unwrap()
    }

    #[tokio::test]
    async fn test_locked_database_times_out_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let store = file_store(&path, Duration::from_millis(50));

        let foreign = Connection::open(&path).unwrap();
        foreign.execute_batch("BEGIN IMMEDIATE").unwrap();

        let err = store
            .insert_event(new_event("r1", "i1", EventType::WorkflowScheduled))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{err}");

        foreign.execute_batch("COMMIT").unwrap();
        assert_eq!(store.count_by_instance(&inst("i1")).await.unwrap(), 0);

        let retried = store
            .insert_event(new_event("r1", "i1", EventType::WorkflowScheduled))
            .await
            .unwrap();
        assert_eq!(retried.sequence, 1);
    }

    #[tokio::test]
    async fn test_queued_append_gives_up_at_deadline() {
        let store = SqliteStore::open_memory().unwrap();
        let store = SqliteStore {
            config: SqliteConfig::default().with_busy_timeout(Duration::from_millis(50)),
            ..store
        };

        let guard = lock(&store.writer).unwrap();
        let release = async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            drop(guard);
        };
        let (result, ()) = tokio::join!(
            store.insert_event(new_event("r1", "i1", EventType::WorkflowScheduled)),
            release
        );

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.count_by_instance(&inst("i1")).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reads_do_not_wait_for_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let store = Arc::new(file_store(&path, Duration::from_secs(5)));
        store.insert_event(new_event("r1", "other", EventType::WorkflowScheduled)).await.unwrap();

        let foreign = Connection::open(&path).unwrap();
        foreign.execute_batch("BEGIN IMMEDIATE").unwrap();

        let pending = tokio::spawn({
            let store = Arc::clone(&store);
            async move {
                store
                    .insert_event(new_event("r1", "a", EventType::WorkflowScheduled))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The append above is parked on the database lock.
        let count = tokio::time::timeout(
            Duration::from_millis(500),
            store.count_by_instance(&inst("other")),
        )
        .await
        .expect("read waited for the writer")
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.count_by_instance(&inst("a")).await.unwrap(), 0);

        foreign.execute_batch("COMMIT").unwrap();
        assert_eq!(pending.await.unwrap().unwrap().sequence, 1);
    }

    async fn race_scheduled(stores: Vec<Arc<SqliteStore>>, tasks: usize) -> usize {
        let mut handles = Vec::new();
        for n in 0..tasks {
            let store = Arc::clone(&stores[n % stores.len()]);
            handles.push(tokio::spawn(async move {
                store
                    .insert_event(new_event("r1", "race", EventType::WorkflowScheduled))
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(StoreError::DuplicateLifecycleEvent { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        wins
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scheduled_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("history.db")).unwrap());

        assert_eq!(race_scheduled(vec![Arc::clone(&store)], 16).await, 1);
        assert_eq!(store.count_by_instance(&inst("race")).await.unwrap(), 1);
        assert_eq!(store.count_instances_of_registration(&reg("r1")).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_handles_one_file_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let first = Arc::new(SqliteStore::open(&path).unwrap());
        let second = Arc::new(SqliteStore::open(&path).unwrap());

        let wins = race_scheduled(vec![Arc::clone(&first), Arc::clone(&second)], 16).await;
        assert_eq!(wins, 1);
        for store in [first, second] {
            assert_eq!(store.count_by_instance(&inst("race")).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_reopen_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_event(new_event("r1", "i1", EventType::WorkflowScheduled)).await.unwrap();
            store.insert_event(new_event("r1", "i1", EventType::WorkflowCompleted)).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count_by_instance(&inst("i1")).await.unwrap(), 2);
        assert!(store.find_completed_event(&inst("i1")).await.unwrap().is_some());

        let again = store.insert_event(new_event("r1", "i1", EventType::WorkflowCompleted)).await;
        assert!(matches!(again, Err(StoreError::DuplicateLifecycleEvent { .. })));
    }
}
