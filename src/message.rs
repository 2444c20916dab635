use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted message. Immutable once created: `id` and `sent_at` are
/// assigned by the store, never by clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    /// Optional reference to a catalog item; opaque to the messaging core.
    pub item_ref: Option<i64>,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Client-supplied message content, before the store assigns identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub receiver_id: Uuid,
    #[serde(default)]
    pub item_ref: Option<i64>,
    pub text: String,
}

/// Events the client sends over the live channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Binds the connection to the token's user. Must precede any `send`.
    #[serde(rename_all = "camelCase")]
    Join { token: String },
    /// Equivalent to `POST /api/messages`; the created message comes back
    /// as a `receive` push to every open session of both parties.
    #[serde(rename_all = "camelCase")]
    Send {
        receiver_id: Uuid,
        #[serde(default)]
        item_ref: Option<i64>,
        text: String,
    },
}

/// Events the server pushes over the live channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Joined { user_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Receive { message: Message },
    #[serde(rename_all = "camelCase")]
    Error { code: String, reason: String },
}
