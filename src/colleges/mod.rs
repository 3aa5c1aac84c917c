use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct College {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
}

/// A user-submitted request to add a missing college
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CollegeRequest {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub requested_by: Uuid,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCollege {
    #[validate(length(min = 2, max = 200, message = "College name is too short or too long"))]
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestCollege {
    #[validate(length(min = 2, max = 200, message = "College name is too short or too long"))]
    pub name: String,
    #[validate(length(min = 2, max = 200, message = "Location is too short or too long"))]
    pub location: String,
}

/// The admin can rename the college while approving the request
#[derive(Debug, Deserialize, Validate)]
pub struct ApproveCollegeRequest {
    #[validate(length(min = 2, max = 200, message = "College name is too short or too long"))]
    pub final_name: String,
}
