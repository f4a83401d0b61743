//! Volatile in-memory event log adapter.
//!
//! `MemoryEventStore` keeps the whole log in a `Vec` behind an async
//! `RwLock`. Data lives for the process lifetime only - this is the
//! development and test adapter. Swapping it for the durable
//! `PostgresEventStore` changes nothing in bus or module behavior; both
//! honor the same `EventStore` contract.
//!
//! # Atomicity
//!
//! `append` assigns the sequence and pushes the record while holding the
//! write lock, with no await point in between. A caller-side deadline can
//! therefore only cancel the append before it acquired the lock: either
//! the event is fully recorded or it never was.

use modulith_core::event::{EventRecord, PendingEvent};
use modulith_core::store::{EventStore, StoreFuture};
use modulith_core::stream::{Sequence, StreamId};
use tokio::sync::RwLock;

/// Append-only in-memory event log. Volatile: dropped with the process.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    log: RwLock<Vec<EventRecord>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of appended events.
    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }
}

impl EventStore for MemoryEventStore {
    fn append(&self, event: PendingEvent) -> StoreFuture<'_, EventRecord> {
        Box::pin(async move {
            let mut log = self.log.write().await;
            // Sequences start at 1; the log index is sequence - 1.
            let sequence = Sequence::new(log.len() as u64 + 1);
            let record = EventRecord::from_pending(event, sequence);
            log.push(record.clone());
            tracing::trace!(sequence = sequence.value(), event_type = %record.event_type, "appended");
            Ok(record)
        })
    }

    fn read_from(&self, from: Sequence) -> StoreFuture<'_, Vec<EventRecord>> {
        Box::pin(async move {
            let log = self.log.read().await;
            Ok(log
                .iter()
                .filter(|record| record.sequence >= from)
                .cloned()
                .collect())
        })
    }

    fn read_stream(&self, stream_id: StreamId) -> StoreFuture<'_, Vec<EventRecord>> {
        Box::pin(async move {
            let log = self.log.read().await;
            Ok(log
                .iter()
                .filter(|record| record.stream_id == stream_id)
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modulith_core::event::{Event, PendingEvent};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    struct Noted {
        text: String,
    }

    impl Event for Noted {
        fn event_type(&self) -> &'static str {
            "Noted.v1"
        }
    }

    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn pending(text: &str, stream: StreamId) -> PendingEvent {
        PendingEvent::from_event(
            &Noted {
                text: text.to_string(),
            },
            stream,
        )
        .expect("serialization should succeed")
    }

    #[tokio::test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if the store errors
    async fn append_assigns_monotonic_sequences_from_one() {
        let store = MemoryEventStore::new();
        let stream = StreamId::new_random();

        let first = store
            .append(pending("a", stream))
            .await
            .expect("append should succeed");
        let second = store
            .append(pending("b", stream))
            .await
            .expect("append should succeed");

        assert_eq!(first.sequence, Sequence::new(1));
        assert_eq!(second.sequence, Sequence::new(2));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if the store errors
    async fn read_from_is_a_restartable_cursor() {
        let store = MemoryEventStore::new();
        let stream = StreamId::new_random();
        for text in ["a", "b", "c"] {
            store
                .append(pending(text, stream))
                .await
                .expect("append should succeed");
        }

        let all = store
            .read_from(Sequence::new(1))
            .await
            .expect("read should succeed");
        assert_eq!(all.len(), 3);

        let tail = store
            .read_from(Sequence::new(3))
            .await
            .expect("read should succeed");
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].sequence, Sequence::new(3));

        let past_end = store
            .read_from(Sequence::new(10))
            .await
            .expect("read should succeed");
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if the store errors
    async fn read_stream_partitions_the_log() {
        let store = MemoryEventStore::new();
        let bob = StreamId::new_random();
        let nancy = StreamId::new_random();

        store
            .append(pending("bob-1", bob))
            .await
            .expect("append should succeed");
        store
            .append(pending("nancy-1", nancy))
            .await
            .expect("append should succeed");
        store
            .append(pending("bob-2", bob))
            .await
            .expect("append should succeed");

        let bobs = store.read_stream(bob).await.expect("read should succeed");
        assert_eq!(bobs.len(), 2);
        assert!(bobs[0].sequence < bobs[1].sequence);

        let unknown = store
            .read_stream(StreamId::new_random())
            .await
            .expect("read should succeed");
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn empty_log_reads_empty() {
        let store = MemoryEventStore::new();
        assert!(store.is_empty().await);
        let records = store.read_from(Sequence::new(1)).await;
        assert!(matches!(records, Ok(ref r) if r.is_empty()));
    }
}
