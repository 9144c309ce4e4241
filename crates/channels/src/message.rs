use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::Result;

/// Message direction relative to this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// A persisted message record. Append-mostly: after insert, only the
/// viewed flag ever changes, and deletion is an explicit admin action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Externally-assigned, globally unique id.
    pub message_id: String,
    /// Canonical digit-only phone of the counterpart.
    pub phone: String,
    /// Weak reference to the counterpart's lead, when resolvable.
    pub lead_id: Option<String>,
    pub outgoing: bool,
    pub direction: Direction,
    pub message_text: String,
    pub has_media: bool,
    pub media_path: Option<String>,
    pub is_viewed: bool,
    pub viewed_at: Option<i64>,
    /// Event time reported by the network, epoch seconds.
    pub timestamp: i64,
    /// Ingest time, epoch seconds.
    pub received_at: i64,
}

/// Fields of a message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub message_id: String,
    pub phone: String,
    pub lead_id: Option<String>,
    pub outgoing: bool,
    pub message_text: String,
    pub has_media: bool,
    pub media_path: Option<String>,
    pub is_viewed: bool,
    pub timestamp: i64,
}

impl NewMessage {
    #[must_use]
    pub fn direction(&self) -> Direction {
        if self.outgoing {
            Direction::Outbound
        } else {
            Direction::Inbound
        }
    }
}

/// Result of an insert-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The `message_id` was already present; the write was a no-op.
    Duplicate,
}

/// Filters for the message listing surface. All optional, ANDed together.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub phone: Option<String>,
    pub direction: Option<Direction>,
    pub is_viewed: Option<bool>,
    pub has_media: Option<bool>,
    /// Case-insensitive substring match over the message text.
    pub search: Option<String>,
}

/// 1-based pagination window.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl Page {
    /// Saturating: a huge page number yields a window past the end,
    /// never a wrapped offset.
    #[must_use]
    pub fn offset(self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// Counts by direction/viewed/media over the whole log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageStats {
    pub total: i64,
    pub inbound: i64,
    pub outbound: i64,
    pub unviewed: i64,
    pub with_media: i64,
}

/// Thread grouping key: lead when resolvable, canonical phone otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ThreadKey {
    Lead(String),
    Phone(String),
}

/// One aggregated conversation group from the message log, before the
/// lead/officer join.
#[derive(Debug, Clone)]
pub struct ThreadRow {
    pub key: ThreadKey,
    /// Phone of the latest message in the group.
    pub phone: String,
    pub lead_id: Option<String>,
    pub total_messages: i64,
    /// Inbound and not yet viewed.
    pub unread_count: i64,
    pub last_message: Message,
}

/// Durable idempotent message log.
///
/// `insert` is insert-if-absent keyed by `message_id`: at-most-one persisted
/// copy under at-least-once delivery, duplicates are a no-op, never an error.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, msg: NewMessage) -> Result<InsertOutcome>;
    async fn get(&self, message_id: &str) -> Result<Option<Message>>;
    async fn list(&self, filter: &MessageFilter, page: Page) -> Result<(Vec<Message>, i64)>;
    /// Flip the viewed flag on one message. Returns false if absent.
    async fn mark_viewed(&self, message_id: &str) -> Result<bool>;
    /// Mark every message in a thread viewed. Returns the flipped count.
    async fn mark_thread_viewed(&self, key: &ThreadKey) -> Result<u64>;
    /// Administrative delete. Returns false if absent.
    async fn delete(&self, message_id: &str) -> Result<bool>;
    async fn stats(&self) -> Result<MessageStats>;
    /// All conversation groups with aggregates, unsorted.
    async fn thread_rows(&self) -> Result<Vec<ThreadRow>>;
}
