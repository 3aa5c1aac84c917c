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
    error::AppError,
    reports::{Report, ResolveReport, SubmitReport, STATUS_DISMISSED, STATUS_RESOLVED},
    response::ApiResponse,
};

/// Report a confession for moderation
/// POST /api/confessions/:id/report
pub async fn submit_report(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(confession_id): Path<Uuid>,
    Json(payload): Json<SubmitReport>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    sqlx::query("SELECT id FROM confessions WHERE id = $1")
        .bind(confession_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Confession not found".to_string()))?;

    let report = sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO reports (confession_id, reporter_id, reason)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(confession_id)
    .bind(claims.sub)
    .bind(payload.reason.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create report: {:?}", e);
        AppError::InternalServerError
    })?;

    Ok(ApiResponse::success(report).created())
}

/// All reports, newest first (admin)
/// GET /api/admin/reports
pub async fn get_reports(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;

    let reports = sqlx::query_as::<_, Report>("SELECT * FROM reports ORDER BY created_at DESC")
        .fetch_all(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::success(reports))
}

/// Resolve or dismiss a report, recording which admin handled it (admin)
/// POST /api/admin/reports/:id/resolve
pub async fn resolve_report(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(report_id): Path<Uuid>,
    Json(payload): Json<ResolveReport>,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;

    if payload.status != STATUS_RESOLVED && payload.status != STATUS_DISMISSED {
        return Err(AppError::UnprocessableEntity(
            "Status must be 'resolved' or 'dismissed'".to_string(),
        ));
    }

    let report = sqlx::query_as::<_, Report>(
        r#"
        UPDATE reports SET status = $2, resolved_by = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(report_id)
    .bind(&payload.status)
    .bind(claims.sub)
    .fetch_optional(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .ok_or(AppError::NotFound("Report not found".to_string()))?;

    Ok(ApiResponse::success(report))
}

/// Delete a report (admin)
/// DELETE /api/admin/reports/:id
pub async fn delete_report(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(report_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    admin::require_admin(&pool, claims.sub).await?;

    sqlx::query("DELETE FROM reports WHERE id = $1")
        .bind(report_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("Report deleted".to_string()))
}
