use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::message::Message;

/// A derived two-party conversation summary. Never persisted; recomputed
/// from the message log on every query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub peer_id: Uuid,
    pub last_message: Message,
    pub last_message_time: DateTime<Utc>,
    /// Watermark heuristic: peer-to-self messages newer than the most
    /// recent self-to-peer message. Replying marks everything as read;
    /// there is no per-message read flag.
    pub unread_count: i64,
}

/// Derives who-talked-to-whom summaries from the message log.
pub struct ConversationAggregator {
    pool: DbPool,
}

#[derive(sqlx::FromRow)]
struct PeerRow {
    peer_id: String,
}

impl ConversationAggregator {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// One entry per distinct peer the user has exchanged at least one
    /// message with, ordered by last message time descending.
    ///
    /// The grouped query and the per-peer lookups all run over the
    /// participant/pair indexes; nothing rescans the full log.
    pub async fn conversations_for(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let uid = user_id.to_string();

        let peers = sqlx::query_as::<_, PeerRow>(
            r#"
            SELECT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS peer_id
            FROM messages
            WHERE sender_id = ?1 OR receiver_id = ?1
            GROUP BY peer_id
            ORDER BY MAX(sent_at) DESC
            "#,
        )
        .bind(&uid)
        .fetch_all(&self.pool)
        .await?;

        let mut conversations = Vec::with_capacity(peers.len());
        for row in peers {
            let peer_id = Uuid::parse_str(&row.peer_id)
                .map_err(|_| AppError::internal("corrupt peer id in message log"))?;

            let last_message = self.last_message(&uid, &row.peer_id).await?;
            let unread_count = self.unread_count(&uid, &row.peer_id).await?;

            conversations.push(Conversation {
                peer_id,
                last_message_time: last_message.sent_at,
                last_message,
                unread_count,
            });
        }

        Ok(conversations)
    }

    /// Max-`(sent_at, id)` message in either direction of the pair.
    async fn last_message(&self, user_id: &str, peer_id: &str) -> AppResult<Message> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: i64,
            sender_id: String,
            receiver_id: String,
            item_ref: Option<i64>,
            text: String,
            sent_at: i64,
        }

        let row = sqlx::query_as::<_, Row>(
            r#"
            SELECT id, sender_id, receiver_id, item_ref, text, sent_at
            FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2)
               OR (sender_id = ?2 AND receiver_id = ?1)
            ORDER BY sent_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Message {
            id: row.id,
            sender_id: Uuid::parse_str(&row.sender_id)
                .map_err(|_| AppError::internal("corrupt sender id in message log"))?,
            receiver_id: Uuid::parse_str(&row.receiver_id)
                .map_err(|_| AppError::internal("corrupt receiver id in message log"))?,
            item_ref: row.item_ref,
            text: row.text,
            sent_at: DateTime::<Utc>::from_timestamp_micros(row.sent_at)
                .ok_or_else(|| AppError::internal("corrupt timestamp in message log"))?,
        })
    }

    /// Peer-to-self messages strictly newer than the most recent
    /// self-to-peer message. With nothing sent yet, every peer message
    /// counts as unread.
    async fn unread_count(&self, user_id: &str, peer_id: &str) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE sender_id = ?2 AND receiver_id = ?1
              AND sent_at > COALESCE(
                  (SELECT MAX(sent_at) FROM messages
                   WHERE sender_id = ?1 AND receiver_id = ?2),
                  0)
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
