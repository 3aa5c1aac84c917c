use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: Uuid,
    pub confession_id: Uuid,
    pub reporter_id: Uuid,
    pub reason: String,
    pub status: String,
    pub resolved_by: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub const STATUS_RESOLVED: &str = "resolved";
pub const STATUS_DISMISSED: &str = "dismissed";

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReport {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Reason must be between 1 and 500 characters"
    ))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveReport {
    /// "resolved" or "dismissed"
    pub status: String,
}
