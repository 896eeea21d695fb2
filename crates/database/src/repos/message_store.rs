//! Durable message storage.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};

use crate::entities::{Contact, Direction, Message, MessageRecord, MessageStatus};
use crate::types::{StoreError, StoreResult};

/// Result of appending a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new record was written
    Inserted,
    /// A record with the same `(conversation_id, message_id)` already existed; nothing changed
    Duplicate,
}

impl AppendOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppendOutcome::Duplicate)
    }
}

/// Key-ordered persistence of messages with atomic single-record writes.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new record. Re-appending an existing key is a successful no-op.
    async fn append(&self, record: &MessageRecord) -> StoreResult<AppendOutcome>;

    /// Every record, ascending by timestamp, ties in insertion order.
    async fn query_all(&self) -> StoreResult<Vec<MessageRecord>>;

    async fn find(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> StoreResult<Option<MessageRecord>>;

    /// Atomically replace the status if it is still `expected`.
    ///
    /// Fails with [`StoreError::NotFound`] when no record matches and with
    /// [`StoreError::Conflict`] when the stored status moved on.
    async fn update_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        expected: MessageStatus,
        status: MessageStatus,
    ) -> StoreResult<()>;
}

#[async_trait]
impl<T: MessageStore + ?Sized> MessageStore for Arc<T> {
    async fn append(&self, record: &MessageRecord) -> StoreResult<AppendOutcome> {
        (**self).append(record).await
    }

    async fn query_all(&self) -> StoreResult<Vec<MessageRecord>> {
        (**self).query_all().await
    }

    async fn find(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> StoreResult<Option<MessageRecord>> {
        (**self).find(conversation_id, message_id).await
    }

    async fn update_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        expected: MessageStatus,
        status: MessageStatus,
    ) -> StoreResult<()> {
        (**self)
            .update_status(conversation_id, message_id, expected, status)
            .await
    }
}

const SELECT_COLUMNS: &str = "SELECT conversation_id, message_id, name, number, direction, content, timestamp_ns, status FROM messages";

/// SQLite-backed [`MessageStore`]
#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn record_from_row(row: &SqliteRow) -> StoreResult<MessageRecord> {
        let direction: String = row.try_get("direction")?;
        let status: String = row.try_get("status")?;
        let timestamp_ns: i64 = row.try_get("timestamp_ns")?;

        Ok(MessageRecord {
            contact: Contact {
                name: row.try_get("name")?,
                number: row.try_get("number")?,
            },
            message: Message {
                conversation_id: row.try_get("conversation_id")?,
                message_id: row.try_get("message_id")?,
                direction: direction
                    .parse::<Direction>()
                    .map_err(|e| StoreError::InvalidRecord(e.to_string()))?,
                content: row.try_get("content")?,
                timestamp: Utc.timestamp_nanos(timestamp_ns),
                status: status
                    .parse::<MessageStatus>()
                    .map_err(|e| StoreError::InvalidRecord(e.to_string()))?,
            },
        })
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(&self, record: &MessageRecord) -> StoreResult<AppendOutcome> {
        let message = &record.message;
        let timestamp_ns = message.timestamp.timestamp_nanos_opt().ok_or_else(|| {
            StoreError::InvalidRecord(format!(
                "timestamp {} is outside the storable range",
                message.timestamp
            ))
        })?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO messages (conversation_id, message_id, name, number, direction, content, timestamp_ns, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (conversation_id, message_id) DO NOTHING",
        )
        .bind(&message.conversation_id)
        .bind(&message.message_id)
        .bind(&record.contact.name)
        .bind(&record.contact.number)
        .bind(message.direction.as_str())
        .bind(&message.content)
        .bind(timestamp_ns)
        .bind(message.status.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(
                conversation_id = %message.conversation_id,
                message_id = %message.message_id,
                "duplicate message ignored"
            );
            return Ok(AppendOutcome::Duplicate);
        }

        info!(
            conversation_id = %message.conversation_id,
            message_id = %message.message_id,
            direction = %message.direction,
            "stored new message"
        );
        Ok(AppendOutcome::Inserted)
    }

    async fn query_all(&self) -> StoreResult<Vec<MessageRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY timestamp_ns ASC, seq ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn find(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> StoreResult<Option<MessageRecord>> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE conversation_id = ? AND message_id = ?"
        ))
        .bind(conversation_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn update_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        expected: MessageStatus,
        status: MessageStatus,
    ) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE messages SET status = ?, updated_at = ?
             WHERE conversation_id = ? AND message_id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(conversation_id)
        .bind(message_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            info!(conversation_id, message_id, %status, "updated message status");
            return Ok(());
        }

        match self.find(conversation_id, message_id).await? {
            None => Err(StoreError::not_found(conversation_id, message_id)),
            Some(_) => Err(StoreError::Conflict {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
                expected,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use chrono::{DateTime, Duration};
    use tempfile::TempDir;

    async fn create_test_store() -> (SqliteMessageStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_messages.db");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let pool = SqlitePool::connect(&db_url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        (SqliteMessageStore::new(pool), temp_dir)
    }

    fn record(conversation_id: &str, message_id: &str, at: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            contact: Contact {
                name: format!("Contact {conversation_id}"),
                number: conversation_id.to_string(),
            },
            message: Message {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
                direction: Direction::Incoming,
                content: format!("body of {message_id}"),
                timestamp: at,
                status: MessageStatus::Pending,
            },
        }
    }

    #[tokio::test]
    async fn test_append_and_find() {
        let (store, _temp_dir) = create_test_store().await;
        let at = Utc.timestamp_nanos(1_714_557_600_123_456_789);
        let original = record("+15550001", "m1", at);

        let outcome = store.append(&original).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Inserted);

        let found = store.find("+15550001", "m1").await.unwrap().unwrap();
        assert_eq!(found, original);
        assert!(store.find("+15550001", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_append_keeps_original_content() {
        let (store, _temp_dir) = create_test_store().await;
        let original = record("+15550001", "m1", Utc::now());
        store.append(&original).await.unwrap();

        let mut replay = original.clone();
        replay.message.content = "tampered".to_string();
        let outcome = store.append(&replay).await.unwrap();

        assert!(outcome.is_duplicate());
        let all = store.query_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].message.content, original.message.content);
    }

    #[tokio::test]
    async fn test_same_message_id_in_other_conversation_is_distinct() {
        let (store, _temp_dir) = create_test_store().await;
        let now = Utc::now();
        store.append(&record("a", "m1", now)).await.unwrap();
        let outcome = store.append(&record("b", "m1", now)).await.unwrap();

        assert_eq!(outcome, AppendOutcome::Inserted);
        assert_eq!(store.query_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_query_all_orders_by_timestamp_then_insertion() {
        let (store, _temp_dir) = create_test_store().await;
        let base = Utc::now();

        store.append(&record("a", "late", base + Duration::seconds(10))).await.unwrap();
        store.append(&record("b", "tie-1", base)).await.unwrap();
        store.append(&record("a", "tie-2", base)).await.unwrap();
        store.append(&record("b", "early", base - Duration::seconds(10))).await.unwrap();

        let ids: Vec<String> = store
            .query_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.message.message_id)
            .collect();
        assert_eq!(ids, vec!["early", "tie-1", "tie-2", "late"]);
    }

    #[tokio::test]
    async fn test_update_status_compare_and_set() {
        let (store, _temp_dir) = create_test_store().await;
        store.append(&record("a", "m1", Utc::now())).await.unwrap();

        store
            .update_status("a", "m1", MessageStatus::Pending, MessageStatus::Delivered)
            .await
            .unwrap();
        let found = store.find("a", "m1").await.unwrap().unwrap();
        assert_eq!(found.message.status, MessageStatus::Delivered);

        let stale = store
            .update_status("a", "m1", MessageStatus::Pending, MessageStatus::Sent)
            .await;
        assert!(matches!(stale, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_status_unknown_message() {
        let (store, _temp_dir) = create_test_store().await;

        let result = store
            .update_status("a", "nope", MessageStatus::Pending, MessageStatus::Sent)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
