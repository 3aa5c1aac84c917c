use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{PgPool, Row};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{jwt, User, UserResponse},
    error::AppError,
    response::ApiResponse,
    users::{
        DeviceTokenRequest, UpdateProfile, UserProfileResponse, UsernameAvailability,
        UsernameQuery,
    },
};

/// Get a user's public profile with follow stats
/// GET /api/users/:id
pub async fn get_user_profile(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query(
        r#"
        SELECT
            u.id, u.username, u.display_name, u.bio, u.avatar_url, u.college_id, u.created_at,
            (SELECT COUNT(*) FROM follows WHERE following_id = u.id) AS followers_count,
            (SELECT COUNT(*) FROM follows WHERE follower_id = u.id) AS following_count
        FROM users u WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    // Check if current user follows this user
    let is_following = if let Some(claims) = claims {
        sqlx::query("SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(claims.sub)
            .bind(user_id)
            .fetch_optional(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
            .is_some()
    } else {
        false
    };

    Ok(ApiResponse::success(UserProfileResponse {
        id: user.get("id"),
        username: user.get("username"),
        display_name: user.get("display_name"),
        bio: user.get("bio"),
        avatar_url: user.get("avatar_url"),
        college_id: user.get("college_id"),
        followers_count: user.get("followers_count"),
        following_count: user.get("following_count"),
        is_following,
        created_at: user.get("created_at"),
    }))
}

/// Update the caller's profile (username/college setup included)
/// PUT /api/users/me
pub async fn update_me(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<UpdateProfile>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    if let Some(college_id) = payload.college_id {
        sqlx::query("SELECT id FROM colleges WHERE id = $1")
            .bind(college_id)
            .fetch_optional(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
            .ok_or(AppError::NotFound("College not found".to_string()))?;
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            username = COALESCE($2, username),
            display_name = COALESCE($3, display_name),
            bio = COALESCE($4, bio),
            avatar_url = COALESCE($5, avatar_url),
            college_id = COALESCE($6, college_id)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(claims.sub)
    .bind(payload.username.as_deref().map(str::trim))
    .bind(&payload.display_name)
    .bind(&payload.bio)
    .bind(&payload.avatar_url)
    .bind(payload.college_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e: sqlx::Error| {
        if e.to_string().contains("duplicate key value") {
            AppError::Conflict("Username already taken".to_string())
        } else {
            tracing::error!("Database error: {:?}", e);
            AppError::InternalServerError
        }
    })?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::success(UserResponse::from(user)))
}

/// Username availability probe used by the setup screen
/// GET /api/users/username-available?username=
pub async fn username_available(
    State(pool): State<PgPool>,
    Query(query): Query<UsernameQuery>,
) -> Result<impl IntoResponse, AppError> {
    if crate::users::validate_username(&query.username).is_err() {
        return Ok(ApiResponse::success(UsernameAvailability {
            available: false,
        }));
    }

    let taken = sqlx::query("SELECT 1 FROM users WHERE username = $1")
        .bind(query.username.trim())
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .is_some();

    Ok(ApiResponse::success(UsernameAvailability {
        available: !taken,
    }))
}

/// Store the caller's FCM device token for push delivery
/// PUT /api/users/me/device-token
pub async fn register_device_token(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<DeviceTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    sqlx::query("UPDATE users SET fcm_token = $2 WHERE id = $1")
        .bind(claims.sub)
        .bind(&payload.token)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("Device token registered".to_string()))
}

/// Delete the caller's account and everything it produced
/// DELETE /api/users/me
pub async fn delete_me(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    delete_account(&pool, claims.sub).await?;
    Ok(ApiResponse::ok("Account deleted".to_string()))
}

/// Full cascade used both by self-deletion and the admin panel. Runs in a
/// single transaction so a failure partway leaves the account intact.
pub async fn delete_account(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("Failed to begin transaction: {:?}", e);
        AppError::InternalServerError
    })?;

    let steps = [
        "DELETE FROM notifications WHERE user_id = $1 OR actor_id = $1",
        "DELETE FROM messages WHERE sender_id = $1 OR receiver_id = $1",
        "DELETE FROM comments WHERE author_id = $1",
        "DELETE FROM confession_likes WHERE user_id = $1",
        "DELETE FROM confessions WHERE author_id = $1",
        "DELETE FROM follows WHERE follower_id = $1 OR following_id = $1",
        "DELETE FROM blocks WHERE blocker_id = $1 OR blocked_id = $1",
        "DELETE FROM accepted_chats WHERE user_id = $1 OR peer_id = $1",
        "DELETE FROM reports WHERE reporter_id = $1",
        "DELETE FROM users WHERE id = $1",
    ];

    for sql in steps {
        sqlx::query(sql)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Account deletion step failed: {:?}", e);
                AppError::InternalServerError
            })?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit account deletion: {:?}", e);
        AppError::InternalServerError
    })?;

    Ok(())
}
