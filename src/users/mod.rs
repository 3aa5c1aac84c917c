use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{auth::User, error::AppError};

pub mod handler;

/// Request payload for profile setup/update. All fields optional so the
/// setup flow can submit username, college and avatar in separate steps.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(custom(function = validate_username))]
    pub username: Option<String>,
    #[validate(length(max = 50, message = "Display name is too long"))]
    pub display_name: Option<String>,
    #[validate(length(max = 300, message = "Bio is too long"))]
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub college_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UsernameAvailability {
    pub available: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeviceTokenRequest {
    #[validate(length(min = 1, max = 1024, message = "Invalid device token"))]
    pub token: String,
}

/// Another user's profile with follow stats, as seen by the caller.
#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    pub id: Uuid,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub college_id: Option<Uuid>,
    pub followers_count: i64,
    pub following_count: i64,
    pub is_following: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.len() < 3 || trimmed.len() > 32 {
        return Err(ValidationError::new("username_length"));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::new("username_chars"));
    }
    Ok(())
}

pub async fn load_user(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("Database error: {:?}", e);
            AppError::InternalServerError
        })?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Gate for every write that produces content (confessions, comments,
/// messages): banned and currently-suspended accounts are refused before
/// anything touches the store.
pub async fn load_active_user(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
    let user = load_user(pool, id).await?;
    if user.is_banned {
        return Err(AppError::Forbidden(
            "This account has been banned".to_string(),
        ));
    }
    if let Some(until) = user.suspended_until {
        if until > Utc::now() {
            return Err(AppError::Forbidden(format!(
                "Account suspended until {}",
                until.to_rfc3339()
            )));
        }
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_validation_allows_expected_chars() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("bob-the-builder").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("bad!name").is_err());
    }
}
