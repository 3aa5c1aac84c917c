use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt,
    confessions::{
        AuthorResponse, Confession, ConfessionResponse, CreateConfession, FeedFilter,
        LikeActionResponse, Visibility,
    },
    error::AppError,
    events::EventBus,
    notifications::{self, KIND_LIKE},
    push::PushClient,
    response::ApiResponse,
    users,
};

/// Helper struct for fetching confessions with author and counter info
#[derive(FromRow)]
struct ConfessionFromDb {
    id: Uuid,
    author_id: Uuid,
    content: String,
    college_id: Uuid,
    is_anonymous: bool,
    visibility: Visibility,
    created_at: chrono::DateTime<chrono::Utc>,
    // Author fields
    username: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    // Counters
    like_count: i64,
    comment_count: i64,
    liked_by_me: bool,
}

impl ConfessionFromDb {
    /// Anonymous posts hide the author from everyone but the author
    /// themselves (and the admin panel, which uses its own listing).
    fn into_response(self, viewer: Option<Uuid>) -> ConfessionResponse {
        let is_mine = viewer == Some(self.author_id);
        let author = if self.is_anonymous && !is_mine {
            None
        } else {
            Some(AuthorResponse {
                id: self.author_id,
                username: self.username,
                display_name: self.display_name,
                avatar_url: self.avatar_url,
            })
        };
        ConfessionResponse {
            id: self.id,
            author,
            content: self.content,
            college_id: self.college_id,
            is_anonymous: self.is_anonymous,
            visibility: self.visibility,
            is_mine,
            like_count: self.like_count,
            liked_by_me: self.liked_by_me,
            comment_count: self.comment_count,
            created_at: self.created_at,
        }
    }
}

const CONFESSION_SELECT: &str = r#"
    SELECT
        c.id, c.author_id, c.content, c.college_id, c.is_anonymous, c.visibility, c.created_at,
        u.username, u.display_name, u.avatar_url,
        (SELECT COUNT(*) FROM confession_likes cl WHERE cl.confession_id = c.id) AS like_count,
        (SELECT COUNT(*) FROM comments cm WHERE cm.confession_id = c.id) AS comment_count,
        EXISTS (
            SELECT 1 FROM confession_likes cl
            WHERE cl.confession_id = c.id AND cl.user_id = $1
        ) AS liked_by_me
    FROM confessions c
    JOIN users u ON c.author_id = u.id
"#;

/// Post a confession
/// POST /api/confessions
pub async fn create_confession(
    State(pool): State<PgPool>,
    State(events): State<EventBus>,
    State(push): State<PushClient>,
    claims: jwt::Claims,
    Json(payload): Json<CreateConfession>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let author = users::load_active_user(&pool, claims.sub).await?;

    let Some(college_id) = author.college_id else {
        return Err(AppError::UnprocessableEntity(
            "Complete profile setup before posting".to_string(),
        ));
    };
    if author.username.is_none() {
        return Err(AppError::UnprocessableEntity(
            "Complete profile setup before posting".to_string(),
        ));
    }

    let confession = sqlx::query_as::<_, Confession>(
        r#"
        INSERT INTO confessions (author_id, content, college_id, is_anonymous, visibility)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(claims.sub)
    .bind(payload.content.trim())
    .bind(college_id)
    .bind(payload.is_anonymous)
    .bind(payload.visibility)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create confession: {:?}", e);
        AppError::InternalServerError
    })?;

    // Feed refresh trigger for connected clients; they filter by college
    events.publish_broadcast(
        "confession:new",
        serde_json::json!({
            "confession_id": confession.id,
            "college_id": college_id,
            "visibility": confession.visibility,
        }),
    );
    // Best-effort college push, never blocks the response. Fires for open
    // posts too; the author's campus always hears about a new post.
    push.push_confession_to_college(&pool, college_id, confession.id, claims.sub)
        .await;

    Ok(ApiResponse::success(confession).created())
}

/// The feed: the caller's campus posts, or the global open feed
/// GET /api/confessions?visibility=campus|open
pub async fn get_feed(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Query(filter): Query<FeedFilter>,
) -> Result<impl IntoResponse, AppError> {
    let visibility = filter.visibility.unwrap_or_default();
    let limit = filter.limit.unwrap_or(50).min(100);
    let offset = filter.offset.unwrap_or(0);

    let rows = match visibility {
        Visibility::Campus => {
            let viewer = users::load_user(&pool, claims.sub).await?;
            let Some(college_id) = viewer.college_id else {
                return Err(AppError::UnprocessableEntity(
                    "Join a college to see the campus feed".to_string(),
                ));
            };

            let query = format!(
                "{CONFESSION_SELECT}
                WHERE c.college_id = $2 AND c.visibility = 'campus' AND NOT c.hidden
                ORDER BY c.created_at DESC
                LIMIT $3 OFFSET $4"
            );
            sqlx::query_as::<_, ConfessionFromDb>(&query)
                .bind(claims.sub)
                .bind(college_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&pool)
                .await
        }
        Visibility::Open => {
            let query = format!(
                "{CONFESSION_SELECT}
                WHERE c.visibility = 'open' AND NOT c.hidden
                ORDER BY c.created_at DESC
                LIMIT $2 OFFSET $3"
            );
            sqlx::query_as::<_, ConfessionFromDb>(&query)
                .bind(claims.sub)
                .bind(limit)
                .bind(offset)
                .fetch_all(&pool)
                .await
        }
    }
    .map_err(|e| {
        tracing::error!("Feed query error: {:?}", e);
        AppError::InternalServerError
    })?;

    let response: Vec<ConfessionResponse> = rows
        .into_iter()
        .map(|c| c.into_response(Some(claims.sub)))
        .collect();

    Ok(ApiResponse::success(response))
}

/// A user's visible posts. Anonymous posts only show on the author's own
/// profile.
/// GET /api/users/:id/confessions
pub async fn get_user_confessions(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let include_anonymous = claims.sub == user_id;

    let query = format!(
        "{CONFESSION_SELECT}
        WHERE c.author_id = $2 AND NOT c.hidden AND (NOT c.is_anonymous OR $3)
        ORDER BY c.created_at DESC"
    );
    let rows = sqlx::query_as::<_, ConfessionFromDb>(&query)
        .bind(claims.sub)
        .bind(user_id)
        .bind(include_anonymous)
        .fetch_all(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    let response: Vec<ConfessionResponse> = rows
        .into_iter()
        .map(|c| c.into_response(Some(claims.sub)))
        .collect();

    Ok(ApiResponse::success(response))
}

/// Toggle a like
/// POST /api/confessions/:id/like
pub async fn toggle_like(
    State(pool): State<PgPool>,
    State(events): State<EventBus>,
    State(push): State<PushClient>,
    claims: jwt::Claims,
    Path(confession_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let confession = sqlx::query_as::<_, Confession>(
        "SELECT * FROM confessions WHERE id = $1 AND NOT hidden",
    )
    .bind(confession_id)
    .fetch_optional(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .ok_or(AppError::NotFound("Confession not found".to_string()))?;

    let deleted = sqlx::query(
        "DELETE FROM confession_likes WHERE confession_id = $1 AND user_id = $2",
    )
    .bind(confession_id)
    .bind(claims.sub)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .rows_affected();

    let liked = if deleted == 0 {
        sqlx::query(
            r#"
            INSERT INTO confession_likes (confession_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (confession_id, user_id) DO NOTHING
            "#,
        )
        .bind(confession_id)
        .bind(claims.sub)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;
        true
    } else {
        false
    };

    let like_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM confession_likes WHERE confession_id = $1",
    )
    .bind(confession_id)
    .fetch_one(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    // Anonymous posts never generate like notifications; a "liked your
    // confession" ping would tie the author to the post on their device.
    if liked && confession.author_id != claims.sub && !confession.is_anonymous {
        let liker = users::load_user(&pool, claims.sub).await?;
        notifications::notify(
            &pool,
            &events,
            &push,
            confession.author_id,
            KIND_LIKE,
            Some(liker.id),
            &liker.display_name_or_username(),
            liker.avatar_url.as_deref(),
            Some(confession_id),
            Some("liked your confession"),
        )
        .await;
    }

    Ok(ApiResponse::success(LikeActionResponse { liked, like_count }))
}

/// Delete a confession (author or admin)
/// DELETE /api/confessions/:id
pub async fn delete_confession(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(confession_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let confession =
        sqlx::query_as::<_, Confession>("SELECT * FROM confessions WHERE id = $1")
            .bind(confession_id)
            .fetch_optional(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
            .ok_or(AppError::NotFound("Confession not found".to_string()))?;

    if confession.author_id != claims.sub {
        let caller = users::load_user(&pool, claims.sub).await?;
        if !caller.is_admin {
            return Err(AppError::Forbidden(
                "You can only delete your own confessions".to_string(),
            ));
        }
    }

    sqlx::query("DELETE FROM confessions WHERE id = $1")
        .bind(confession_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("Confession deleted".to_string()))
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

    async fn seed_college(pool: &PgPool) -> Uuid {
        sqlx::query_scalar::<_, Uuid>("INSERT INTO colleges (name) VALUES ('Test U') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn seed_user(pool: &PgPool, email: &str, college_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, username, college_id) VALUES ($1, $2, 'x', $3, $4)",
        )
        .bind(id)
        .bind(email)
        .bind(email.split('@').next().unwrap())
        .bind(college_id)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn seed_confession(
        pool: &PgPool,
        author_id: Uuid,
        college_id: Uuid,
        is_anonymous: bool,
    ) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO confessions (author_id, content, college_id, is_anonymous)
            VALUES ($1, 'something heavy', $2, $3)
            RETURNING id
            "#,
        )
        .bind(author_id)
        .bind(college_id)
        .bind(is_anonymous)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn notifications_for(pool: &PgPool, user_id: Uuid) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn liking_an_anonymous_confession_stays_silent(pool: PgPool) {
        let college = seed_college(&pool).await;
        let author = seed_user(&pool, "author@campus.edu", college).await;
        let liker = seed_user(&pool, "liker@campus.edu", college).await;
        let confession = seed_confession(&pool, author, college, true).await;

        let res = toggle_like(
            State(pool.clone()),
            State(EventBus::new()),
            State(PushClient::disabled()),
            claims_for(liker),
            Path(confession),
        )
        .await;
        assert!(res.is_ok());

        let likes = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM confession_likes WHERE confession_id = $1",
        )
        .bind(confession)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(likes, 1);

        assert_eq!(notifications_for(&pool, author).await, 0);
    }

    #[sqlx::test]
    async fn liking_an_attributed_confession_notifies_the_author(pool: PgPool) {
        let college = seed_college(&pool).await;
        let author = seed_user(&pool, "author@campus.edu", college).await;
        let liker = seed_user(&pool, "liker@campus.edu", college).await;
        let confession = seed_confession(&pool, author, college, false).await;

        let res = toggle_like(
            State(pool.clone()),
            State(EventBus::new()),
            State(PushClient::disabled()),
            claims_for(liker),
            Path(confession),
        )
        .await;
        assert!(res.is_ok());

        let kind = sqlx::query_scalar::<_, String>(
            "SELECT kind FROM notifications WHERE user_id = $1",
        )
        .bind(author)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(kind, "like");
    }
}
