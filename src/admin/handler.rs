use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    admin::{require_admin, SuspendRequest},
    auth::{jwt, User, UserResponse},
    confessions::Visibility,
    error::AppError,
    response::ApiResponse,
    users,
};

/// List every account (admin)
/// GET /api/admin/users
pub async fn get_all_users(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&pool, claims.sub).await?;

    let rows = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    let response: Vec<UserResponse> = rows.into_iter().map(UserResponse::from).collect();
    Ok(ApiResponse::success(response))
}

/// POST /api/admin/users/:id/ban
pub async fn ban_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&pool, claims.sub).await?;
    set_banned(&pool, user_id, true).await?;
    Ok(ApiResponse::ok("User banned".to_string()))
}

/// POST /api/admin/users/:id/unban
pub async fn unban_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&pool, claims.sub).await?;
    set_banned(&pool, user_id, false).await?;
    Ok(ApiResponse::ok("User unbanned".to_string()))
}

async fn set_banned(pool: &PgPool, user_id: Uuid, banned: bool) -> Result<(), AppError> {
    let updated = sqlx::query("UPDATE users SET is_banned = $2 WHERE id = $1")
        .bind(user_id)
        .bind(banned)
        .execute(pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Suspend an account until the given timestamp (admin)
/// POST /api/admin/users/:id/suspend
pub async fn suspend_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SuspendRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&pool, claims.sub).await?;

    let updated = sqlx::query("UPDATE users SET suspended_until = $2 WHERE id = $1")
        .bind(user_id)
        .bind(payload.until)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(ApiResponse::ok("User suspended".to_string()))
}

/// Remove an account and everything it produced (admin)
/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&pool, claims.sub).await?;
    users::handler::delete_account(&pool, user_id).await?;
    Ok(ApiResponse::ok("User deleted".to_string()))
}

/// Helper struct for the moderation content listing
#[derive(FromRow)]
struct AdminConfessionRow {
    id: Uuid,
    author_id: Uuid,
    username: Option<String>,
    content: String,
    college_id: Uuid,
    is_anonymous: bool,
    visibility: Visibility,
    hidden: bool,
    report_count: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// Moderation view of a confession: anonymity unmasked, hidden rows
/// included
#[derive(Debug, Serialize)]
pub struct AdminConfessionResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: Option<String>,
    pub content: String,
    pub college_id: Uuid,
    pub is_anonymous: bool,
    pub visibility: Visibility,
    pub hidden: bool,
    pub report_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Full content listing for the moderation panel (admin)
/// GET /api/admin/confessions
pub async fn get_all_confessions(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&pool, claims.sub).await?;

    let rows = sqlx::query_as::<_, AdminConfessionRow>(
        r#"
        SELECT c.id, c.author_id, u.username, c.content, c.college_id,
               c.is_anonymous, c.visibility, c.hidden, c.created_at,
               (SELECT COUNT(*) FROM reports r WHERE r.confession_id = c.id) AS report_count
        FROM confessions c
        JOIN users u ON c.author_id = u.id
        ORDER BY c.created_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let response: Vec<AdminConfessionResponse> = rows
        .into_iter()
        .map(|r| AdminConfessionResponse {
            id: r.id,
            author_id: r.author_id,
            author_username: r.username,
            content: r.content,
            college_id: r.college_id,
            is_anonymous: r.is_anonymous,
            visibility: r.visibility,
            hidden: r.hidden,
            report_count: r.report_count,
            created_at: r.created_at,
        })
        .collect();

    Ok(ApiResponse::success(response))
}

/// Soft-hide a confession without deleting it (admin)
/// POST /api/admin/confessions/:id/hide
pub async fn hide_confession(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(confession_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&pool, claims.sub).await?;

    let updated = sqlx::query("UPDATE confessions SET hidden = TRUE WHERE id = $1")
        .bind(confession_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("Confession not found".to_string()));
    }

    Ok(ApiResponse::ok("Confession hidden".to_string()))
}

/// Restore a hidden confession (admin)
/// POST /api/admin/confessions/:id/unhide
pub async fn unhide_confession(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(confession_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&pool, claims.sub).await?;

    let updated = sqlx::query("UPDATE confessions SET hidden = FALSE WHERE id = $1")
        .bind(confession_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("Confession not found".to_string()));
    }

    Ok(ApiResponse::ok("Confession restored".to_string()))
}
