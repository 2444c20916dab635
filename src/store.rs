use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::DbPool;
use crate::directory::UserDirectory;
use crate::error::{AppError, AppResult};
use crate::message::Message;
use crate::pagination::{Page, PageRequest};

/// Append-only persisted message log; the single source of truth.
///
/// All mutation goes through [`MessageStore::append`], which is the sole
/// arbiter of `id` and `sent_at` assignment. Appends serialize on an async
/// mutex (tokio mutexes are FIFO), so commit order equals the order in
/// which calls reached the store and per-sender ordering holds even for
/// concurrent sends.
pub struct MessageStore {
    pool: DbPool,
    users: Arc<dyn UserDirectory>,
    max_text_length: usize,
    /// Last assigned timestamp in microseconds. Holding this lock across
    /// the insert keeps `sent_at` strictly increasing per store instance.
    clock: Mutex<i64>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    sender_id: String,
    receiver_id: String,
    item_ref: Option<i64>,
    text: String,
    sent_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = AppError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let sender_id = Uuid::parse_str(&row.sender_id)
            .map_err(|_| AppError::internal("corrupt sender id in message log"))?;
        let receiver_id = Uuid::parse_str(&row.receiver_id)
            .map_err(|_| AppError::internal("corrupt receiver id in message log"))?;
        let sent_at = DateTime::<Utc>::from_timestamp_micros(row.sent_at)
            .ok_or_else(|| AppError::internal("corrupt timestamp in message log"))?;

        Ok(Message {
            id: row.id,
            sender_id,
            receiver_id,
            item_ref: row.item_ref,
            text: row.text,
            sent_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, sender_id, receiver_id, item_ref, text, sent_at";

impl MessageStore {
    pub fn new(pool: DbPool, users: Arc<dyn UserDirectory>, max_text_length: usize) -> Self {
        Self {
            pool,
            users,
            max_text_length,
            clock: Mutex::new(0),
        }
    }

    /// Validates, assigns `id`/`sent_at` and durably persists a message.
    /// Once the insert has started it runs to completion or fails
    /// definitively; there are no partial writes and no silent retries.
    pub async fn append(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        item_ref: Option<i64>,
        text: &str,
    ) -> AppResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::invalid_message("text must not be empty"));
        }
        if text.chars().count() > self.max_text_length {
            return Err(AppError::invalid_message(format!(
                "text must be at most {} characters",
                self.max_text_length
            )));
        }
        if sender_id == receiver_id {
            return Err(AppError::invalid_message(
                "sender and receiver must be different users",
            ));
        }
        if !self.users.user_exists(receiver_id).await? {
            return Err(AppError::ReceiverNotFound);
        }

        let mut last_micros = self.clock.lock().await;
        let sent_at_micros = Utc::now().timestamp_micros().max(*last_micros + 1);

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, item_ref, text, sent_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(sender_id.to_string())
        .bind(receiver_id.to_string())
        .bind(item_ref)
        .bind(text)
        .bind(sent_at_micros)
        .fetch_one(&self.pool)
        .await?;

        *last_micros = sent_at_micros;
        drop(last_micros);

        let sent_at = DateTime::<Utc>::from_timestamp_micros(sent_at_micros)
            .ok_or_else(|| AppError::internal("assigned timestamp out of range"))?;

        tracing::debug!(message_id = id, sender_id = %sender_id, receiver_id = %receiver_id, "Message persisted");

        Ok(Message {
            id,
            sender_id,
            receiver_id,
            item_ref,
            text: text.to_string(),
            sent_at,
        })
    }

    /// Messages between `user_id` and `peer_id`, newest first by
    /// `(sent_at, id)`, starting strictly after the request cursor.
    pub async fn history(
        &self,
        user_id: Uuid,
        peer_id: Uuid,
        request: &PageRequest,
    ) -> AppResult<Page<Message>> {
        let (cursor_micros, cursor_id) = cursor_bounds(request);

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM messages
            WHERE ((sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1))
              AND (sent_at < ?3 OR (sent_at = ?3 AND id < ?4))
            ORDER BY sent_at DESC, id DESC
            LIMIT ?5
            "#
        ))
        .bind(user_id.to_string())
        .bind(peer_id.to_string())
        .bind(cursor_micros)
        .bind(cursor_id)
        .bind(request.limit)
        .fetch_all(&self.pool)
        .await?;

        into_page(rows, request)
    }

    /// All messages where `user_id` is sender or receiver, same ordering
    /// and pagination semantics as [`MessageStore::history`].
    pub async fn inbox(
        &self,
        user_id: Uuid,
        request: &PageRequest,
    ) -> AppResult<Page<Message>> {
        let (cursor_micros, cursor_id) = cursor_bounds(request);

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM messages
            WHERE (sender_id = ?1 OR receiver_id = ?1)
              AND (sent_at < ?2 OR (sent_at = ?2 AND id < ?3))
            ORDER BY sent_at DESC, id DESC
            LIMIT ?4
            "#
        ))
        .bind(user_id.to_string())
        .bind(cursor_micros)
        .bind(cursor_id)
        .bind(request.limit)
        .fetch_all(&self.pool)
        .await?;

        into_page(rows, request)
    }
}

/// Absent cursor means "start from newest"; the exclusive upper bound is
/// then larger than any assignable sort key.
fn cursor_bounds(request: &PageRequest) -> (i64, i64) {
    match request.cursor {
        Some(cursor) => (cursor.sent_at_micros, cursor.id),
        None => (i64::MAX, i64::MAX),
    }
}

fn into_page(rows: Vec<MessageRow>, request: &PageRequest) -> AppResult<Page<Message>> {
    let items = rows
        .into_iter()
        .map(Message::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TEXT_LENGTH;
    use crate::db;
    use crate::directory::SqlUserDirectory;

    async fn store_with_users() -> (MessageStore, Uuid, Uuid) {
        let pool = db::create_pool("sqlite::memory:", 1).await.unwrap();
        db::init_schema(&pool).await.unwrap();
        let alice = db::create_user(&pool, "alice").await.unwrap();
        let bob = db::create_user(&pool, "bob").await.unwrap();

        let users = Arc::new(SqlUserDirectory::new(pool.clone()));
        (MessageStore::new(pool, users, MAX_TEXT_LENGTH), alice, bob)
    }

    #[tokio::test]
    async fn append_then_history_returns_message_first() {
        let (store, alice, bob) = store_with_users().await;

        store.append(alice, bob, None, "older").await.unwrap();
        let newest = store.append(alice, bob, None, "newest").await.unwrap();

        let page = store
            .history(alice, bob, &PageRequest::first_page())
            .await
            .unwrap();
        assert_eq!(page.items.first(), Some(&newest));
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn append_rejects_invalid_messages() {
        let (store, alice, bob) = store_with_users().await;

        assert!(matches!(
            store.append(alice, bob, None, "   ").await,
            Err(AppError::InvalidMessage(_))
        ));

        let oversized = "x".repeat(MAX_TEXT_LENGTH + 1);
        assert!(matches!(
            store.append(alice, bob, None, &oversized).await,
            Err(AppError::InvalidMessage(_))
        ));

        assert!(matches!(
            store.append(alice, alice, None, "hi me").await,
            Err(AppError::InvalidMessage(_))
        ));
    }

    #[tokio::test]
    async fn append_rejects_unknown_receiver() {
        let (store, alice, _bob) = store_with_users().await;

        assert!(matches!(
            store.append(alice, Uuid::new_v4(), None, "anyone there?").await,
            Err(AppError::ReceiverNotFound)
        ));

        // Nothing was persisted by the failed append.
        let page = store.inbox(alice, &PageRequest::first_page()).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn text_is_stored_trimmed() {
        let (store, alice, bob) = store_with_users().await;
        let message = store.append(alice, bob, None, "  padded  ").await.unwrap();
        assert_eq!(message.text, "padded");
    }

    #[tokio::test]
    async fn sequential_appends_get_increasing_sort_keys() {
        let (store, alice, bob) = store_with_users().await;

        let mut previous: Option<Message> = None;
        for i in 0..20 {
            let message = store
                .append(alice, bob, None, &format!("message {}", i))
                .await
                .unwrap();
            if let Some(prev) = previous {
                assert!(message.id > prev.id);
                assert!(message.sent_at > prev.sent_at);
            }
            previous = Some(message);
        }
    }

    #[tokio::test]
    async fn inbox_spans_both_directions() {
        let (store, alice, bob) = store_with_users().await;

        store.append(alice, bob, None, "from alice").await.unwrap();
        store.append(bob, alice, None, "from bob").await.unwrap();

        let page = store.inbox(alice, &PageRequest::first_page()).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].text, "from bob");
        assert_eq!(page.items[1].text, "from alice");
    }

    #[tokio::test]
    async fn history_is_scoped_to_the_pair() {
        let (store, alice, bob) = store_with_users().await;
        // Third party talking to alice must not appear in the alice/bob pair.
        let pool = &store.pool;
        let carol = db::create_user(pool, "carol").await.unwrap();

        store.append(alice, bob, None, "to bob").await.unwrap();
        store.append(carol, alice, None, "from carol").await.unwrap();

        let page = store
            .history(alice, bob, &PageRequest::first_page())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].text, "to bob");
    }
}
