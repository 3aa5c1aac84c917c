use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{events::EventBus, push::PushClient};

pub mod handler;

/// Database model for a notification row
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub actor_avatar: Option<String>,
    pub entity_id: Option<Uuid>,
    pub content: Option<String>,
    pub read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Notification kinds. Stored as plain text, mirrored by the clients.
/// The legacy "follow" kind still exists in stored rows but nothing
/// creates it anymore.
pub const KIND_LIKE: &str = "like";
pub const KIND_COMMENT: &str = "comment";
pub const KIND_SYSTEM: &str = "system";

/// Request payload for an admin announcement
#[derive(Debug, Deserialize, Validate)]
pub struct AnnouncementRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Announcement must be between 1 and 1000 characters"
    ))]
    pub message: String,
    /// None broadcasts to every user
    pub college_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct UnreadNotificationsResponse {
    pub count: i64,
}

/// Everything a notification needs to reach its recipient: the stored row,
/// an SSE event, and a best-effort push. Insert failures are logged and
/// swallowed so the triggering action still succeeds.
#[allow(clippy::too_many_arguments)]
pub async fn notify(
    pool: &PgPool,
    events: &EventBus,
    push: &PushClient,
    recipient: Uuid,
    kind: &str,
    actor_id: Option<Uuid>,
    actor_name: &str,
    actor_avatar: Option<&str>,
    entity_id: Option<Uuid>,
    content: Option<&str>,
) {
    let result = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO notifications (user_id, kind, actor_id, actor_name, actor_avatar, entity_id, content)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(recipient)
    .bind(kind)
    .bind(actor_id)
    .bind(actor_name)
    .bind(actor_avatar)
    .bind(entity_id)
    .bind(content)
    .fetch_one(pool)
    .await;

    let notification_id = match result {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Failed to create notification: {:?}", e);
            return;
        }
    };

    events.publish(
        "notification:new",
        recipient,
        serde_json::json!({ "notification_id": notification_id, "kind": kind }),
    );

    push.push_notification(pool, recipient, kind, content, notification_id)
        .await;
}
