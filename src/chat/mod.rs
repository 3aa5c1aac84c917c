use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;
pub mod inbox;

/// Database model for a direct message. Immutable once created except for
/// the read flag; rows are bulk-deleted when a chat is rejected.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Request payload for sending a message
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessage {
    #[validate(length(
        min = 1,
        max = 4000,
        message = "Message must be between 1 and 4000 characters"
    ))]
    pub content: String,
}

/// Peer info embedded in inbox summaries
#[derive(Debug, Serialize)]
pub struct PeerResponse {
    pub id: Uuid,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// One conversation as shown in the inbox
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub peer: PeerResponse,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}

/// The inbox, partitioned per the viewer
#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub requests: Vec<ConversationSummary>,
    pub accepted: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}
