use axum::{extract::State, response::IntoResponse, Json};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    admin,
    auth::jwt,
    error::AppError,
    events::EventBus,
    notifications::{
        notify, AnnouncementRequest, Notification, UnreadNotificationsResponse, KIND_SYSTEM,
    },
    push::PushClient,
    response::ApiResponse,
};

/// The caller's notifications, newest first, capped at 50
/// GET /api/notifications
pub async fn get_notifications(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 50
        "#,
    )
    .bind(claims.sub)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(notifications))
}

/// Batch mark-read
/// POST /api/notifications/read
pub async fn mark_notifications_read(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
        .bind(claims.sub)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("Notifications marked read".to_string()))
}

/// GET /api/notifications/unread-count
pub async fn get_unread_notification_count(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read",
    )
    .bind(claims.sub)
    .fetch_one(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(UnreadNotificationsResponse { count }))
}

/// Admin announcement, fanned out to one college or everyone
/// POST /api/admin/announcements
pub async fn send_announcement(
    State(pool): State<PgPool>,
    State(events): State<EventBus>,
    State(push): State<PushClient>,
    claims: jwt::Claims,
    Json(payload): Json<AnnouncementRequest>,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let recipients: Vec<Uuid> = if let Some(college_id) = payload.college_id {
        sqlx::query_scalar("SELECT id FROM users WHERE college_id = $1")
            .bind(college_id)
            .fetch_all(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
    } else {
        sqlx::query_scalar("SELECT id FROM users")
            .fetch_all(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
    };

    let count = recipients.len();
    for recipient in recipients {
        notify(
            &pool,
            &events,
            &push,
            recipient,
            KIND_SYSTEM,
            None,
            "Admin",
            None,
            None,
            Some(&payload.message),
        )
        .await;
    }

    Ok(ApiResponse::ok(format!(
        "Announcement sent to {} users",
        count
    )))
}
