use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::AppError;
use crate::handlers::extractors::AuthenticatedUser;
use crate::message::MessageDraft;
use crate::pagination::PageRequest;

/// POST /api/messages
///
/// Persists and fans out a message. `201` with the created record, or
/// `404 RECEIVER_NOT_FOUND` / `404 ITEM_NOT_FOUND` / `400 INVALID_MESSAGE`.
pub async fn send_message(
    State(ctx): State<AppContext>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(draft): Json<MessageDraft>,
) -> Result<impl IntoResponse, AppError> {
    let message = ctx.delivery.send(user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessagesParams {
    pub peer_id: Option<Uuid>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/messages?peerId=&cursor=&limit=
///
/// With `peerId`: the pair's history. Without it: the caller's full inbox.
/// Newest first; follow `nextCursor` until it is null.
pub async fn get_messages(
    State(ctx): State<AppContext>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(params): Query<GetMessagesParams>,
) -> Result<impl IntoResponse, AppError> {
    let request = PageRequest::from_query(params.cursor.as_deref(), params.limit)?;

    let page = match params.peer_id {
        Some(peer_id) => ctx.store.history(user_id, peer_id, &request).await?,
        None => ctx.store.inbox(user_id, &request).await?,
    };

    Ok(Json(page))
}

/// GET /api/messages/conversations
///
/// Conversation summaries ordered by last message time descending.
pub async fn get_conversations(
    State(ctx): State<AppContext>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let conversations = ctx.conversations.conversations_for(user_id).await?;
    Ok(Json(conversations))
}
