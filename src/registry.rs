use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::message::ServerEvent;

pub type PushSender = mpsc::Sender<ServerEvent>;

/// Identifies one registered live session. Returned by `register` and
/// required to unregister, so only the owning connection can remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: Uuid,
    pub user_id: Uuid,
}

/// Tracks which users currently hold live sessions and through which
/// push handles. Injectable and lock-guarded; volatile by design (clients
/// re-join after a restart).
///
/// A session enters the map when `join` succeeds (open) and leaves it on
/// disconnect (closed, final). Only open sessions can receive pushes.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<Uuid, HashMap<Uuid, PushSender>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a live session for `user_id`. A user may hold any number of
    /// concurrent sessions (multi-device).
    pub async fn register(&self, user_id: Uuid, tx: PushSender) -> SessionHandle {
        let handle = SessionHandle {
            id: Uuid::new_v4(),
            user_id,
        };

        let mut sessions = self.sessions.write().await;
        sessions.entry(user_id).or_default().insert(handle.id, tx);

        tracing::debug!(user_id = %user_id, session_id = %handle.id, "Session registered");
        handle
    }

    /// Removes a session. Idempotent: racing disconnect paths (explicit
    /// leave vs transport closure) may both call this, and the removal
    /// happens at most once. Returns whether this call removed it.
    pub async fn unregister(&self, handle: &SessionHandle) -> bool {
        let mut sessions = self.sessions.write().await;

        let Some(user_sessions) = sessions.get_mut(&handle.user_id) else {
            return false;
        };
        let removed = user_sessions.remove(&handle.id).is_some();
        if user_sessions.is_empty() {
            sessions.remove(&handle.user_id);
        }

        if removed {
            tracing::debug!(user_id = %handle.user_id, session_id = %handle.id, "Session unregistered");
        }
        removed
    }

    /// Consistent snapshot of the user's live push handles. Empty when the
    /// user is offline, which is a normal state rather than an error.
    pub async fn sessions_for(&self, user_id: Uuid) -> Vec<PushSender> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&user_id)
            .map(|user_sessions| user_sessions.values().cloned().collect())
            .unwrap_or_default()
    }
}
