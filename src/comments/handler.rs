use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt,
    comments::{Comment, CommentAuthor, CommentResponse, CreateComment},
    error::AppError,
    events::EventBus,
    notifications::{self, KIND_COMMENT},
    push::PushClient,
    response::ApiResponse,
    users,
};

/// Helper struct for fetching comments with author info from database
#[derive(FromRow)]
struct CommentFromDb {
    id: Uuid,
    confession_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
    // Author fields
    username: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<CommentFromDb> for CommentResponse {
    fn from(c: CommentFromDb) -> Self {
        CommentResponse {
            id: c.id,
            confession_id: c.confession_id,
            author: CommentAuthor {
                id: c.author_id,
                username: c.username,
                display_name: c.display_name,
                avatar_url: c.avatar_url,
            },
            content: c.content,
            created_at: c.created_at,
        }
    }
}

/// Create a comment on a confession
/// POST /api/confessions/:id/comments
pub async fn create_comment(
    State(pool): State<PgPool>,
    State(events): State<EventBus>,
    State(push): State<PushClient>,
    claims: jwt::Claims,
    Path(confession_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let author = users::load_active_user(&pool, claims.sub).await?;

    // Verify the confession exists and is visible
    let confession = sqlx::query("SELECT id, author_id FROM confessions WHERE id = $1 AND NOT hidden")
        .bind(confession_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Confession not found".to_string()))?;

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (confession_id, author_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(confession_id)
    .bind(claims.sub)
    .bind(payload.content.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError
    })?;

    let confession_author: Uuid = confession.get("author_id");
    if confession_author != claims.sub {
        let snippet: String = comment.content.chars().take(80).collect();
        notifications::notify(
            &pool,
            &events,
            &push,
            confession_author,
            KIND_COMMENT,
            Some(author.id),
            &author.display_name_or_username(),
            author.avatar_url.as_deref(),
            Some(confession_id),
            Some(&snippet),
        )
        .await;
    }

    Ok(ApiResponse::success(comment).created())
}

/// List a confession's comments, oldest first
/// GET /api/confessions/:id/comments
pub async fn get_comments(
    State(pool): State<PgPool>,
    Path(confession_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM confessions WHERE id = $1 AND NOT hidden")
        .bind(confession_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Confession not found".to_string()))?;

    let comments = sqlx::query_as::<_, CommentFromDb>(
        r#"
        SELECT c.id, c.confession_id, c.author_id, c.content, c.created_at,
               u.username, u.display_name, u.avatar_url
        FROM comments c
        JOIN users u ON c.author_id = u.id
        WHERE c.confession_id = $1
        ORDER BY c.created_at ASC
        "#,
    )
    .bind(confession_id)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let response: Vec<CommentResponse> = comments.into_iter().map(CommentResponse::from).collect();

    Ok(ApiResponse::success(response))
}
