use serde::Serialize;
use uuid::Uuid;

pub mod handler;

/// Response for a user in the blocked list
#[derive(Debug, Serialize)]
pub struct BlockedUserResponse {
    pub id: Uuid,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub blocked_at: chrono::DateTime<chrono::Utc>,
}
