use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::message::Message;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// Opaque pagination token: the `(sent_at, id)` sort key of the last item
/// a page returned. Cursor-based rather than offset-based, so pages stay
/// stable while new messages are inserted concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub sent_at_micros: i64,
    pub id: i64,
}

impl Cursor {
    pub fn for_message(message: &Message) -> Self {
        Self {
            sent_at_micros: message.sent_at.timestamp_micros(),
            id: message.id,
        }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.sent_at_micros, self.id))
    }

    pub fn decode(token: &str) -> AppResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AppError::InvalidCursor)?;
        let decoded = String::from_utf8(bytes).map_err(|_| AppError::InvalidCursor)?;

        let (sent_at, id) = decoded.split_once(':').ok_or(AppError::InvalidCursor)?;
        Ok(Self {
            sent_at_micros: sent_at.parse().map_err(|_| AppError::InvalidCursor)?,
            id: id.parse().map_err(|_| AppError::InvalidCursor)?,
        })
    }
}

/// A validated page request: decoded cursor plus a server-side clamped limit.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    pub limit: i64,
}

impl PageRequest {
    pub fn from_query(cursor: Option<&str>, limit: Option<i64>) -> AppResult<Self> {
        let cursor = cursor.map(Cursor::decode).transpose()?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(Self { cursor, limit })
    }

    /// Start from the newest message with the default page size.
    pub fn first_page() -> Self {
        Self {
            cursor: None,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_limit(limit: i64) -> Self {
        Self {
            cursor: None,
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn after(cursor: Cursor, limit: i64) -> Self {
        Self {
            cursor: Some(cursor),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// One page of results. `next_cursor` is `None` exactly when the page came
/// back short, meaning the end of the data was reached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl Page<Message> {
    pub fn new(items: Vec<Message>, request: &PageRequest) -> Self {
        let next_cursor = if items.len() as i64 == request.limit {
            items.last().map(|m| Cursor::for_message(m).encode())
        } else {
            None
        };
        Self { items, next_cursor }
    }
}
