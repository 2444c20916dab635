use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::directory::ItemCatalog;
use crate::error::{AppError, AppResult};
use crate::message::{Message, MessageDraft, ServerEvent};
use crate::registry::ConnectionRegistry;
use crate::store::MessageStore;

/// Persist-then-fan-out send pipeline.
///
/// Each step is a precondition for the next: validate the optional item
/// reference, append to the durable store, then push to every open session
/// of both parties. A failed append propagates unchanged and nothing is
/// pushed; a failed push is logged and swallowed, since the durable log is
/// the at-least-once delivery guarantee.
pub struct DeliveryEngine {
    store: Arc<MessageStore>,
    registry: Arc<ConnectionRegistry>,
    catalog: Arc<dyn ItemCatalog>,
    /// Held across commit and fan-out so pushes leave in commit order.
    send_gate: Mutex<()>,
}

impl DeliveryEngine {
    pub fn new(
        store: Arc<MessageStore>,
        registry: Arc<ConnectionRegistry>,
        catalog: Arc<dyn ItemCatalog>,
    ) -> Self {
        Self {
            store,
            registry,
            catalog,
            send_gate: Mutex::new(()),
        }
    }

    pub async fn send(&self, sender_id: Uuid, draft: MessageDraft) -> AppResult<Message> {
        if let Some(item_ref) = draft.item_ref {
            if !self.catalog.item_exists(item_ref).await? {
                return Err(AppError::ItemNotFound);
            }
        }

        let _gate = self.send_gate.lock().await;

        let message = self
            .store
            .append(sender_id, draft.receiver_id, draft.item_ref, &draft.text)
            .await?;

        self.fan_out(&message).await;

        Ok(message)
    }

    /// Pushes the persisted message to every open session of the sender
    /// (multi-device echo) and the receiver. `try_send` on the bounded
    /// per-session buffer keeps one stalled client from blocking the
    /// sender's request or other recipients.
    async fn fan_out(&self, message: &Message) {
        let mut targets = self.registry.sessions_for(message.sender_id).await;
        targets.extend(self.registry.sessions_for(message.receiver_id).await);

        if targets.is_empty() {
            tracing::debug!(message_id = message.id, "No live sessions, skipping push");
            return;
        }

        let event = ServerEvent::Receive {
            message: message.clone(),
        };
        for session in targets {
            if let Err(e) = session.try_send(event.clone()) {
                // Best effort: the recipient catches up from history.
                tracing::debug!(message_id = message.id, error = %e, "Push skipped for slow or closed session");
            }
        }
    }
}
