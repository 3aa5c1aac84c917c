use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{auth::jwt, blocks::BlockedUserResponse, error::AppError, response::ApiResponse};

/// Block a user
/// POST /api/users/:id/block
///
/// One logical operation: records the block, tears down the follow
/// relationship in both directions and drops the blocker's accepted-chat
/// entry. Message history stays (unlike rejecting a chat).
pub async fn block_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if claims.sub == user_id {
        return Err(AppError::UnprocessableEntity(
            "You cannot block yourself".to_string(),
        ));
    }

    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("Failed to begin transaction: {:?}", e);
        AppError::InternalServerError
    })?;

    sqlx::query(
        r#"
        INSERT INTO blocks (blocker_id, blocked_id)
        VALUES ($1, $2)
        ON CONFLICT (blocker_id, blocked_id) DO NOTHING
        "#,
    )
    .bind(claims.sub)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    sqlx::query(
        r#"
        DELETE FROM follows
        WHERE (follower_id = $1 AND following_id = $2)
           OR (follower_id = $2 AND following_id = $1)
        "#,
    )
    .bind(claims.sub)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    sqlx::query("DELETE FROM accepted_chats WHERE user_id = $1 AND peer_id = $2")
        .bind(claims.sub)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit block: {:?}", e);
        AppError::InternalServerError
    })?;

    Ok(ApiResponse::ok("User blocked".to_string()))
}

/// Unblock a user. Only reverses the block itself; follows and accepted
/// chats are not restored.
/// DELETE /api/users/:id/block
pub async fn unblock_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("DELETE FROM blocks WHERE blocker_id = $1 AND blocked_id = $2")
        .bind(claims.sub)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("User unblocked".to_string()))
}

#[derive(FromRow)]
struct BlockedRow {
    id: Uuid,
    username: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    blocked_at: chrono::DateTime<chrono::Utc>,
}

/// List the caller's blocked users
/// GET /api/users/me/blocked
pub async fn get_blocked_users(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, BlockedRow>(
        r#"
        SELECT u.id, u.username, u.display_name, u.avatar_url, b.created_at as blocked_at
        FROM blocks b
        JOIN users u ON b.blocked_id = u.id
        WHERE b.blocker_id = $1
        ORDER BY b.created_at DESC
        "#,
    )
    .bind(claims.sub)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let users: Vec<BlockedUserResponse> = rows
        .into_iter()
        .map(|r| BlockedUserResponse {
            id: r.id,
            username: r.username,
            display_name: r.display_name,
            avatar_url: r.avatar_url,
            blocked_at: r.blocked_at,
        })
        .collect();

    Ok(ApiResponse::success(users))
}

/// True when either side has blocked the other. Message sending and
/// follow attempts consult this before writing anything.
pub async fn pair_blocked(pool: &PgPool, a: Uuid, b: Uuid) -> Result<bool, AppError> {
    let row = sqlx::query(
        r#"
        SELECT 1 FROM blocks
        WHERE (blocker_id = $1 AND blocked_id = $2)
           OR (blocker_id = $2 AND blocked_id = $1)
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_for(id: Uuid) -> jwt::Claims {
        jwt::Claims {
            sub: id,
            exp: 0,
            iat: 0,
        }
    }

    async fn seed_user(pool: &PgPool, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email, password_hash) VALUES ($1, $2, 'x')")
            .bind(id)
            .bind(email)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    #[sqlx::test]
    async fn blocking_tears_down_relationship_but_keeps_messages(pool: PgPool) {
        let alice = seed_user(&pool, "alice@campus.edu").await;
        let bob = seed_user(&pool, "bob@campus.edu").await;

        for (follower, following) in [(alice, bob), (bob, alice)] {
            sqlx::query("INSERT INTO follows (follower_id, following_id) VALUES ($1, $2)")
                .bind(follower)
                .bind(following)
                .execute(&pool)
                .await
                .unwrap();
        }
        for (user, peer) in [(alice, bob), (bob, alice)] {
            sqlx::query("INSERT INTO accepted_chats (user_id, peer_id) VALUES ($1, $2)")
                .bind(user)
                .bind(peer)
                .execute(&pool)
                .await
                .unwrap();
        }
        for (sender, receiver) in [(alice, bob), (bob, alice)] {
            sqlx::query("INSERT INTO messages (sender_id, receiver_id, content) VALUES ($1, $2, 'hi')")
                .bind(sender)
                .bind(receiver)
                .execute(&pool)
                .await
                .unwrap();
        }

        let res = block_user(State(pool.clone()), claims_for(alice), Path(bob)).await;
        assert!(res.is_ok());

        assert!(pair_blocked(&pool, alice, bob).await.unwrap());

        let follows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(follows, 0);

        // Only the blocker's acceptance is dropped
        let blocker_side = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM accepted_chats WHERE user_id = $1 AND peer_id = $2",
        )
        .bind(alice)
        .bind(bob)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(blocker_side, 0);

        let peer_side = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM accepted_chats WHERE user_id = $1 AND peer_id = $2",
        )
        .bind(bob)
        .bind(alice)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(peer_side, 1);

        // Message history survives a block
        let messages = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(messages, 2);
    }
}
