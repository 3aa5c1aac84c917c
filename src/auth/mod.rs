use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;
pub mod jwt;
pub mod utils;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// None until the profile setup flow completes.
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub college_id: Option<Uuid>,
    pub is_admin: bool,
    pub is_banned: bool,
    pub suspended_until: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing)]
    pub fcm_token: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    /// Display identity falls back to the username; "Someone" only shows up
    /// for accounts that never finished setup.
    pub fn display_name_or_username(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| "Someone".to_string())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// The caller's own account, as returned by sign-up/sign-in/me.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub college_id: Option<Uuid>,
    pub is_admin: bool,
    pub is_banned: bool,
    pub suspended_until: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            username: user.username,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            college_id: user.college_id,
            is_admin: user.is_admin,
            is_banned: user.is_banned,
            suspended_until: user.suspended_until,
            created_at: user.created_at,
        }
    }
}
