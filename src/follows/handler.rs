use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    auth::jwt,
    blocks,
    error::AppError,
    follows::{FollowActionResponse, FollowListFilter, FollowListResponse, FollowUserResponse},
    response::ApiResponse,
};

/// Helper struct for fetching user with follow info
#[derive(FromRow)]
struct UserFollowRow {
    id: Uuid,
    username: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    followed_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserFollowRow> for FollowUserResponse {
    fn from(u: UserFollowRow) -> Self {
        FollowUserResponse {
            id: u.id,
            username: u.username,
            display_name: u.display_name,
            avatar_url: u.avatar_url,
            followed_at: u.followed_at,
        }
    }
}

async fn followers_count(pool: &PgPool, user_id: Uuid) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE following_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|_| AppError::InternalServerError)
}

/// Follow a user
/// POST /api/users/:id/follow
pub async fn follow_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if claims.sub == user_id {
        return Err(AppError::UnprocessableEntity(
            "You cannot follow yourself".to_string(),
        ));
    }

    // Verify target user exists
    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    // A block in either direction makes the relationship invisible
    if blocks::handler::pair_blocked(&pool, claims.sub, user_id).await? {
        return Err(AppError::Forbidden("blocked".to_string()));
    }

    // Insert follow (ignore if already following)
    sqlx::query(
        r#"
        INSERT INTO follows (follower_id, following_id)
        VALUES ($1, $2)
        ON CONFLICT (follower_id, following_id) DO NOTHING
        "#,
    )
    .bind(claims.sub)
    .bind(user_id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(FollowActionResponse {
        following: true,
        followers_count: followers_count(&pool, user_id).await?,
    }))
}

/// Unfollow a user
/// DELETE /api/users/:id/follow
pub async fn unfollow_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // Verify target user exists
    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(claims.sub)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(FollowActionResponse {
        following: false,
        followers_count: followers_count(&pool, user_id).await?,
    }))
}

/// Get a user's followers
/// GET /api/users/:id/followers
pub async fn get_followers(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let total = followers_count(&pool, user_id).await?;

    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let followers = sqlx::query_as::<_, UserFollowRow>(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url, f.created_at as followed_at
        FROM follows f
        JOIN users u ON f.follower_id = u.id
        WHERE f.following_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let users: Vec<FollowUserResponse> = followers
        .into_iter()
        .map(FollowUserResponse::from)
        .collect();
    let has_more = (offset + limit) < total;

    Ok(ApiResponse::success(FollowListResponse {
        users,
        total,
        has_more,
    }))
}

/// Get users that a user is following
/// GET /api/users/:id/following
pub async fn get_following(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    let limit = filter.limit.unwrap_or(20).min(100);
    let offset = filter.offset.unwrap_or(0);

    let following = sqlx::query_as::<_, UserFollowRow>(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url, f.created_at as followed_at
        FROM follows f
        JOIN users u ON f.following_id = u.id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let users: Vec<FollowUserResponse> = following
        .into_iter()
        .map(FollowUserResponse::from)
        .collect();
    let has_more = (offset + limit) < total;

    Ok(ApiResponse::success(FollowListResponse {
        users,
        total,
        has_more,
    }))
}
