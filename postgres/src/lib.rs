//! Durable `PostgreSQL` event log adapter.
//!
//! `PostgresEventStore` implements the `EventStore` trait over a single
//! `events` table: `BIGSERIAL` assigns the global sequence atomically at
//! insert, so concurrent appenders are ordered by the database itself.
//! This is the production log: the database assigns and replicates the
//! global order, and swapping this adapter in for the volatile
//! `MemoryEventStore` changes nothing in bus or module code.
//!
//! # Durability
//!
//! `append` returns only after the insert has been committed; a pool or
//! connection failure surfaces as `EventStoreError::Unavailable`, and the
//! caller must assume the event was not recorded.
//!
//! # Example
//!
//! ```ignore
//! use modulith_postgres::PostgresEventStore;
//!
//! let store = PostgresEventStore::connect("postgres://localhost/modulith").await?;
//! store.migrate().await?;
//! ```

use chrono::{DateTime, Utc};
use modulith_core::event::{EventId, EventRecord, PendingEvent};
use modulith_core::store::{EventStore, EventStoreError, StoreFuture};
use modulith_core::stream::{Sequence, StreamId};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

/// Row shape of the `events` table.
type EventRow = (
    i64,
    Uuid,
    Uuid,
    String,
    Vec<u8>,
    Option<serde_json::Value>,
    DateTime<Utc>,
);

/// Durable, `PostgreSQL`-backed event log.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL with a default pool.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Unavailable`] if the connection cannot
    /// be established.
    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| EventStoreError::Unavailable(format!("failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Create the `events` table and indexes if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Unavailable`] if migration fails.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EventStoreError::Unavailable(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx_error(error: sqlx::Error) -> EventStoreError {
    match error {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::TypeNotFound { .. } => {
            EventStoreError::Serialization(error.to_string())
        }
        other => EventStoreError::Unavailable(other.to_string()),
    }
}

fn row_to_record(row: EventRow) -> Result<EventRecord, EventStoreError> {
    let (sequence, event_id, stream_id, event_type, data, metadata, occurred_at) = row;
    let sequence = u64::try_from(sequence)
        .map_err(|_| EventStoreError::Serialization(format!("negative sequence {sequence}")))?;
    Ok(EventRecord {
        sequence: Sequence::new(sequence),
        event_id: EventId::from_uuid(event_id),
        stream_id: StreamId::from_uuid(stream_id),
        event_type,
        data,
        metadata,
        occurred_at,
    })
}

impl EventStore for PostgresEventStore {
    fn append(&self, event: PendingEvent) -> StoreFuture<'_, EventRecord> {
        Box::pin(async move {
            let (sequence,): (i64,) = sqlx::query_as(
                "INSERT INTO events (event_id, stream_id, event_type, data, metadata, occurred_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING sequence",
            )
            .bind(event.event_id.as_uuid())
            .bind(event.stream_id.as_uuid())
            .bind(&event.event_type)
            .bind(&event.data)
            .bind(&event.metadata)
            .bind(event.occurred_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            let sequence = u64::try_from(sequence).map_err(|_| {
                EventStoreError::Serialization(format!("negative sequence {sequence}"))
            })?;
            tracing::debug!(sequence, event_type = %event.event_type, "event committed");
            Ok(EventRecord::from_pending(event, Sequence::new(sequence)))
        })
    }

    fn read_from(&self, from: Sequence) -> StoreFuture<'_, Vec<EventRecord>> {
        Box::pin(async move {
            let from = i64::try_from(from.value())
                .map_err(|_| EventStoreError::Serialization(format!("cursor {from} overflows")))?;
            let rows: Vec<EventRow> = sqlx::query_as(
                "SELECT sequence, event_id, stream_id, event_type, data, metadata, occurred_at
                 FROM events
                 WHERE sequence >= $1
                 ORDER BY sequence",
            )
            .bind(from)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            rows.into_iter().map(row_to_record).collect()
        })
    }

    fn read_stream(&self, stream_id: StreamId) -> StoreFuture<'_, Vec<EventRecord>> {
        Box::pin(async move {
            let rows: Vec<EventRow> = sqlx::query_as(
                "SELECT sequence, event_id, stream_id, event_type, data, metadata, occurred_at
                 FROM events
                 WHERE stream_id = $1
                 ORDER BY sequence",
            )
            .bind(stream_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            rows.into_iter().map(row_to_record).collect()
        })
    }
}
