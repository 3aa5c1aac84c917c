use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    admin,
    auth::jwt,
    colleges::{ApproveCollegeRequest, College, CollegeRequest, CreateCollege, RequestCollege},
    error::AppError,
    events::EventBus,
    notifications::{self, KIND_SYSTEM},
    push::PushClient,
    response::ApiResponse,
};

/// List all colleges
/// GET /api/colleges
pub async fn get_colleges(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let colleges = sqlx::query_as::<_, College>("SELECT * FROM colleges ORDER BY name")
        .fetch_all(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(colleges))
}

/// Request a missing college to be added
/// POST /api/colleges/requests
pub async fn request_college(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<RequestCollege>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let request = sqlx::query_as::<_, CollegeRequest>(
        r#"
        INSERT INTO college_requests (name, location, requested_by)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.location.trim())
    .bind(claims.sub)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create college request: {:?}", e);
        AppError::InternalServerError
    })?;

    Ok(ApiResponse::success(request).created())
}

/// Pending college requests, newest first (admin)
/// GET /api/admin/college-requests
pub async fn get_college_requests(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;

    let requests = sqlx::query_as::<_, CollegeRequest>(
        "SELECT * FROM college_requests ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(requests))
}

/// Approve a college request: creates the college under the final name,
/// removes the request and notifies the requester (admin)
/// POST /api/admin/college-requests/:id/approve
pub async fn approve_college_request(
    State(pool): State<PgPool>,
    State(events): State<EventBus>,
    State(push): State<PushClient>,
    claims: jwt::Claims,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ApproveCollegeRequest>,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let request = sqlx::query_as::<_, CollegeRequest>(
        "SELECT * FROM college_requests WHERE id = $1",
    )
    .bind(request_id)
    .fetch_optional(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .ok_or(AppError::NotFound("College request not found".to_string()))?;

    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("Failed to begin transaction: {:?}", e);
        AppError::InternalServerError
    })?;

    let college = sqlx::query_as::<_, College>(
        "INSERT INTO colleges (name, location) VALUES ($1, $2) RETURNING *",
    )
    .bind(payload.final_name.trim())
    .bind(&request.location)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e: sqlx::Error| {
        if e.to_string().contains("duplicate key value") {
            AppError::Conflict("A college with this name already exists".to_string())
        } else {
            tracing::error!("Failed to create college: {:?}", e);
            AppError::InternalServerError
        }
    })?;

    sqlx::query("DELETE FROM college_requests WHERE id = $1")
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit college approval: {:?}", e);
        AppError::InternalServerError
    })?;

    let message = format!(
        "Your request to add \"{}\" (approved as \"{}\") has been approved.",
        request.name, college.name
    );
    notifications::notify(
        &pool,
        &events,
        &push,
        request.requested_by,
        KIND_SYSTEM,
        None,
        "System",
        None,
        None,
        Some(&message),
    )
    .await;

    Ok(ApiResponse::success(college).created())
}

/// Reject a college request: the request is simply removed (admin)
/// DELETE /api/admin/college-requests/:id
pub async fn reject_college_request(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;

    sqlx::query("DELETE FROM college_requests WHERE id = $1")
        .bind(request_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("College request rejected".to_string()))
}

/// Add a college directly (admin)
/// POST /api/colleges
pub async fn create_college(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<CreateCollege>,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let college = sqlx::query_as::<_, College>(
        "INSERT INTO colleges (name, location) VALUES ($1, $2) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(&payload.location)
    .fetch_one(&pool)
    .await
    .map_err(|e: sqlx::Error| {
        if e.to_string().contains("duplicate key value") {
            AppError::Conflict("A college with this name already exists".to_string())
        } else {
            tracing::error!("Failed to create college: {:?}", e);
            AppError::InternalServerError
        }
    })?;

    Ok(ApiResponse::success(college).created())
}

/// Rename a college (admin)
/// PUT /api/colleges/:id
pub async fn update_college(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(college_id): Path<Uuid>,
    Json(payload): Json<CreateCollege>,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let college = sqlx::query_as::<_, College>(
        r#"
        UPDATE colleges SET name = $2, location = COALESCE($3, location)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(college_id)
    .bind(payload.name.trim())
    .bind(&payload.location)
    .fetch_optional(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .ok_or(AppError::NotFound("College not found".to_string()))?;

    Ok(ApiResponse::success(college))
}

/// Delete a college (admin)
/// DELETE /api/colleges/:id
pub async fn delete_college(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(college_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;

    let deleted = sqlx::query("DELETE FROM colleges WHERE id = $1")
        .bind(college_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound("College not found".to_string()));
    }

    Ok(ApiResponse::ok("College deleted".to_string()))
}
