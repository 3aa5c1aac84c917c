use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt,
    blocks,
    chat::{
        inbox::{compute_inbox, MessageEdge, RelationshipState},
        ConversationSummary, InboxResponse, Message, PeerResponse, SendMessage,
        UnreadCountResponse,
    },
    error::AppError,
    events::EventBus,
    push::PushClient,
    response::ApiResponse,
    users,
};

/// Send a direct message
/// POST /api/chat/:peer_id/messages
///
/// The block check runs before any write: sending while blocked in either
/// direction is a policy violation, not a store error. Sending also
/// auto-accepts the peer for the sender, so an outbound-initiated
/// conversation is never a request on the sender's side.
pub async fn send_message(
    State(pool): State<PgPool>,
    State(events): State<EventBus>,
    State(push): State<PushClient>,
    claims: jwt::Claims,
    Path(peer_id): Path<Uuid>,
    Json(payload): Json<SendMessage>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    if claims.sub == peer_id {
        return Err(AppError::UnprocessableEntity(
            "You cannot message yourself".to_string(),
        ));
    }

    let sender = users::load_active_user(&pool, claims.sub).await?;

    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(peer_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if blocks::handler::pair_blocked(&pool, claims.sub, peer_id).await? {
        return Err(AppError::Forbidden("blocked".to_string()));
    }

    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (sender_id, receiver_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(claims.sub)
    .bind(peer_id)
    .bind(payload.content.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert message: {:?}", e);
        AppError::InternalServerError
    })?;

    // Outbound message implies acceptance for the sender
    sqlx::query(
        r#"
        INSERT INTO accepted_chats (user_id, peer_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, peer_id) DO NOTHING
        "#,
    )
    .bind(claims.sub)
    .bind(peer_id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    events.publish(
        "message:new",
        peer_id,
        serde_json::json!({ "message_id": message.id, "sender_id": claims.sub }),
    );
    push.push_message(
        &pool,
        peer_id,
        &sender.display_name_or_username(),
        message.id,
    )
    .await;

    Ok(ApiResponse::success(message).created())
}

/// Fetch the full two-way conversation with a peer, oldest first
/// GET /api/chat/:peer_id/messages
///
/// The peer's unread messages are marked read before the rows are
/// returned, so the unread counters never show messages the viewer has
/// already been handed. A message arriving between the two statements can
/// be marked read unseen; that race is accepted.
pub async fn get_conversation(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(peer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query(
        r#"
        UPDATE messages SET read = TRUE
        WHERE receiver_id = $1 AND sender_id = $2 AND NOT read
        "#,
    )
    .bind(claims.sub)
    .bind(peer_id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE (sender_id = $1 AND receiver_id = $2)
           OR (sender_id = $2 AND receiver_id = $1)
        ORDER BY created_at ASC
        "#,
    )
    .bind(claims.sub)
    .bind(peer_id)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(messages))
}

#[derive(FromRow)]
struct EdgeRow {
    sender_id: Uuid,
    receiver_id: Uuid,
}

#[derive(FromRow)]
struct PeerRow {
    id: Uuid,
    username: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(FromRow)]
struct LastMessageRow {
    peer_id: Uuid,
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: String,
    read: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// The inbox: every conversation partner, partitioned into requests and
/// accepted threads for the viewer
/// GET /api/chat/inbox
pub async fn get_inbox(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    // A vanished account yields an empty inbox, not an error
    let viewer_exists = sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .is_some();
    if !viewer_exists {
        return Ok(ApiResponse::success(InboxResponse {
            requests: vec![],
            accepted: vec![],
        }));
    }

    let following: HashSet<Uuid> =
        sqlx::query_scalar::<_, Uuid>("SELECT following_id FROM follows WHERE follower_id = $1")
            .bind(claims.sub)
            .fetch_all(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
            .into_iter()
            .collect();

    let accepted_chats: HashSet<Uuid> =
        sqlx::query_scalar::<_, Uuid>("SELECT peer_id FROM accepted_chats WHERE user_id = $1")
            .bind(claims.sub)
            .fetch_all(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
            .into_iter()
            .collect();

    let blocked: HashSet<Uuid> =
        sqlx::query_scalar::<_, Uuid>("SELECT blocked_id FROM blocks WHERE blocker_id = $1")
            .bind(claims.sub)
            .fetch_all(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
            .into_iter()
            .collect();

    let edge_rows = sqlx::query_as::<_, EdgeRow>(
        "SELECT sender_id, receiver_id FROM messages WHERE sender_id = $1 OR receiver_id = $1",
    )
    .bind(claims.sub)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let edges: Vec<MessageEdge> = edge_rows
        .into_iter()
        .map(|e| MessageEdge {
            sender_id: e.sender_id,
            receiver_id: e.receiver_id,
        })
        .collect();

    let state = RelationshipState {
        following,
        accepted_chats,
        blocked,
    };
    let partition = compute_inbox(claims.sub, &state, &edges);

    let all_ids: Vec<Uuid> = partition
        .requests
        .iter()
        .chain(partition.accepted.iter())
        .copied()
        .collect();

    if all_ids.is_empty() {
        return Ok(ApiResponse::success(InboxResponse {
            requests: vec![],
            accepted: vec![],
        }));
    }

    let peers: HashMap<Uuid, PeerRow> = sqlx::query_as::<_, PeerRow>(
        "SELECT id, username, display_name, avatar_url FROM users WHERE id = ANY($1)",
    )
    .bind(&all_ids)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

    let last_messages: HashMap<Uuid, Message> = sqlx::query_as::<_, LastMessageRow>(
        r#"
        SELECT DISTINCT ON (peer_id) peer_id, id, sender_id, receiver_id, content, read, created_at
        FROM (
            SELECT m.*,
                   CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END AS peer_id
            FROM messages m
            WHERE m.sender_id = $1 OR m.receiver_id = $1
        ) t
        ORDER BY peer_id, created_at DESC
        "#,
    )
    .bind(claims.sub)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .into_iter()
    .map(|r| {
        (
            r.peer_id,
            Message {
                id: r.id,
                sender_id: r.sender_id,
                receiver_id: r.receiver_id,
                content: r.content,
                read: r.read,
                created_at: r.created_at,
            },
        )
    })
    .collect();

    let unread = unread_per_peer(&pool, claims.sub).await?;

    let build = |ids: Vec<Uuid>| -> Vec<ConversationSummary> {
        let mut summaries: Vec<ConversationSummary> = ids
            .into_iter()
            .filter_map(|id| {
                // A peer whose account vanished mid-flight just drops out
                let peer = peers.get(&id)?;
                Some(ConversationSummary {
                    peer: PeerResponse {
                        id: peer.id,
                        username: peer.username.clone(),
                        display_name: peer.display_name.clone(),
                        avatar_url: peer.avatar_url.clone(),
                    },
                    last_message: last_messages.get(&id).map(|m| Message {
                        id: m.id,
                        sender_id: m.sender_id,
                        receiver_id: m.receiver_id,
                        content: m.content.clone(),
                        read: m.read,
                        created_at: m.created_at,
                    }),
                    unread_count: unread.get(&id).copied().unwrap_or(0),
                })
            })
            .collect();
        // Most recent activity first; accepted peers with no messages yet
        // sink to the bottom
        summaries.sort_by_key(|s| {
            std::cmp::Reverse(s.last_message.as_ref().map(|m| m.created_at))
        });
        summaries
    };

    Ok(ApiResponse::success(InboxResponse {
        requests: build(partition.requests),
        accepted: build(partition.accepted),
    }))
}

/// Explicitly accept a chat request
/// POST /api/chat/:peer_id/accept
pub async fn accept_chat(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(peer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(peer_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO accepted_chats (user_id, peer_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, peer_id) DO NOTHING
        "#,
    )
    .bind(claims.sub)
    .bind(peer_id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("Chat accepted".to_string()))
}

/// Reject a chat: destroys the message history in both directions and
/// removes the viewer's acceptance, returning the pair to the
/// no-conversation state
/// POST /api/chat/:peer_id/reject
pub async fn reject_chat(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(peer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("Failed to begin transaction: {:?}", e);
        AppError::InternalServerError
    })?;

    sqlx::query(
        r#"
        DELETE FROM messages
        WHERE (sender_id = $1 AND receiver_id = $2)
           OR (sender_id = $2 AND receiver_id = $1)
        "#,
    )
    .bind(claims.sub)
    .bind(peer_id)
    .execute(&mut *tx)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    sqlx::query("DELETE FROM accepted_chats WHERE user_id = $1 AND peer_id = $2")
        .bind(claims.sub)
        .bind(peer_id)
        .execute(&mut *tx)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit chat rejection: {:?}", e);
        AppError::InternalServerError
    })?;

    Ok(ApiResponse::ok("Chat rejected".to_string()))
}

/// Global unread badge
/// GET /api/chat/unread-count
pub async fn get_unread_count(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND NOT read",
    )
    .bind(claims.sub)
    .fetch_one(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(UnreadCountResponse { count }))
}

/// Per-peer unread counts
/// GET /api/chat/unread-counts
pub async fn get_unread_counts(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    let counts = unread_per_peer(&pool, claims.sub).await?;
    Ok(ApiResponse::success(counts))
}

async fn unread_per_peer(pool: &PgPool, user_id: Uuid) -> Result<HashMap<Uuid, i64>, AppError> {
    let rows = sqlx::query_as::<_, (Uuid, i64)>(
        r#"
        SELECT sender_id, COUNT(*) FROM messages
        WHERE receiver_id = $1 AND NOT read
        GROUP BY sender_id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(rows.into_iter().collect())
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

    async fn seed_message(pool: &PgPool, sender: Uuid, receiver: Uuid, content: &str) {
        sqlx::query("INSERT INTO messages (sender_id, receiver_id, content) VALUES ($1, $2, $3)")
            .bind(sender)
            .bind(receiver)
            .bind(content)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn seed_accepted(pool: &PgPool, user: Uuid, peer: Uuid) {
        sqlx::query("INSERT INTO accepted_chats (user_id, peer_id) VALUES ($1, $2)")
            .bind(user)
            .bind(peer)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn unread_total(pool: &PgPool, user: Uuid) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND NOT read",
        )
        .bind(user)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn is_accepted(pool: &PgPool, user: Uuid, peer: Uuid) -> bool {
        sqlx::query("SELECT 1 FROM accepted_chats WHERE user_id = $1 AND peer_id = $2")
            .bind(user)
            .bind(peer)
            .fetch_optional(pool)
            .await
            .unwrap()
            .is_some()
    }

    #[sqlx::test]
    async fn opening_a_conversation_clears_only_that_peers_unread(pool: PgPool) {
        let alice = seed_user(&pool, "alice@campus.edu").await;
        let bob = seed_user(&pool, "bob@campus.edu").await;
        let carol = seed_user(&pool, "carol@campus.edu").await;

        for i in 0..3 {
            seed_message(&pool, bob, alice, &format!("hey {i}")).await;
        }
        seed_message(&pool, carol, alice, "hi").await;
        seed_message(&pool, carol, alice, "you there?").await;
        seed_message(&pool, alice, bob, "later").await;

        assert_eq!(unread_total(&pool, alice).await, 5);

        let res = get_conversation(State(pool.clone()), claims_for(alice), Path(bob)).await;
        assert!(res.is_ok());

        // Bob's 3 are gone, Carol's 2 remain
        assert_eq!(unread_total(&pool, alice).await, 2);
        let per_peer = unread_per_peer(&pool, alice).await.unwrap();
        assert_eq!(per_peer.get(&bob), None);
        assert_eq!(per_peer.get(&carol), Some(&2));
        // Alice's own outbound message is still unread on Bob's side
        assert_eq!(unread_total(&pool, bob).await, 1);
    }

    #[sqlx::test]
    async fn reject_wipes_history_and_only_the_viewers_acceptance(pool: PgPool) {
        let alice = seed_user(&pool, "alice@campus.edu").await;
        let bob = seed_user(&pool, "bob@campus.edu").await;

        seed_message(&pool, bob, alice, "hello").await;
        seed_message(&pool, alice, bob, "hello back").await;
        seed_accepted(&pool, alice, bob).await;
        seed_accepted(&pool, bob, alice).await;

        let res = reject_chat(State(pool.clone()), claims_for(alice), Path(bob)).await;
        assert!(res.is_ok());

        let remaining = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            "#,
        )
        .bind(alice)
        .bind(bob)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(remaining, 0);

        assert!(!is_accepted(&pool, alice, bob).await);
        assert!(is_accepted(&pool, bob, alice).await);
    }

    #[sqlx::test]
    async fn sending_stores_the_message_and_accepts_for_the_sender(pool: PgPool) {
        let alice = seed_user(&pool, "alice@campus.edu").await;
        let bob = seed_user(&pool, "bob@campus.edu").await;

        let res = send_message(
            State(pool.clone()),
            State(EventBus::new()),
            State(PushClient::disabled()),
            claims_for(alice),
            Path(bob),
            Json(SendMessage {
                content: "  hello  ".to_string(),
            }),
        )
        .await;
        assert!(res.is_ok());

        let (receiver, content, read) = sqlx::query_as::<_, (Uuid, String, bool)>(
            "SELECT receiver_id, content, read FROM messages WHERE sender_id = $1",
        )
        .bind(alice)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(receiver, bob);
        assert_eq!(content, "hello");
        assert!(!read);

        assert!(is_accepted(&pool, alice, bob).await);
        assert!(!is_accepted(&pool, bob, alice).await);
    }
}
