use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

pub mod handler;

/// Admin gate. Checked against the database rather than the token so that
/// revoking the flag takes effect immediately.
pub async fn require_admin(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let is_admin = sqlx::query_scalar::<_, bool>("SELECT is_admin FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .unwrap_or(false);

    if !is_admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    pub until: chrono::DateTime<chrono::Utc>,
}
