use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;
use uuid::Uuid;
use validator::Validate;

pub mod handler;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Confession {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub college_id: Uuid,
    pub is_anonymous: bool,
    pub visibility: Visibility,
    pub hidden: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Campus posts only show in the author's college feed; open posts show in
/// the global feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "confession_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Campus,
    Open,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Campus
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateConfession {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Confession must be between 1 and 2000 characters"
    ))]
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Deserialize)]
pub struct FeedFilter {
    pub visibility: Option<Visibility>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Author info on a confession. Absent entirely when the post is
/// anonymous and the viewer is not allowed to see through the mask.
#[derive(Debug, Serialize)]
pub struct AuthorResponse {
    pub id: Uuid,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfessionResponse {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorResponse>,
    pub content: String,
    pub college_id: Uuid,
    pub is_anonymous: bool,
    pub visibility: Visibility,
    pub is_mine: bool,
    pub like_count: i64,
    pub liked_by_me: bool,
    pub comment_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct LikeActionResponse {
    pub liked: bool,
    pub like_count: i64,
}
