use crate::{
    error::Result,
    models::{milestone::*, response::ApiResponse},
    services::auth::AuthUser,
    state::AppState,
    utils::extract::AppJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_milestone))
        .route(
            "/:id",
            get(get_milestone).put(update_milestone).delete(delete_milestone),
        )
        .route("/student/:student_id", get(list_student_milestones))
}

/// Create a milestone
/// POST /milestones
async fn create_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(request): AppJson<CreateMilestoneRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Milestone>>)> {
    debug!("Creating milestone for student: {} by user: {}", request.student_id, user.id);

    let milestone = state
        .milestone_service
        .create_milestone(&user, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(milestone, "Milestone created successfully")),
    ))
}

/// Get a single milestone
/// GET /milestones/:id
async fn get_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(milestone_id): Path<String>,
) -> Result<Json<ApiResponse<Milestone>>> {
    let milestone = state
        .milestone_service
        .get_milestone(&user, &milestone_id)
        .await?;

    Ok(Json(ApiResponse::success(milestone)))
}

/// Partially update a milestone
/// PUT /milestones/:id
async fn update_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(milestone_id): Path<String>,
    AppJson(request): AppJson<UpdateMilestoneRequest>,
) -> Result<Json<ApiResponse<Milestone>>> {
    debug!("Updating milestone: {} by user: {}", milestone_id, user.id);

    let milestone = state
        .milestone_service
        .update_milestone(&user, &milestone_id, request)
        .await?;

    Ok(Json(ApiResponse::success_with_message(milestone, "Milestone updated successfully")))
}

/// Delete a milestone
/// DELETE /milestones/:id
async fn delete_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(milestone_id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    debug!("Deleting milestone: {} by user: {}", milestone_id, user.id);

    state
        .milestone_service
        .delete_milestone(&user, &milestone_id)
        .await?;

    Ok(Json(ApiResponse::success_with_message((), "Milestone deleted successfully")))
}

/// List a student's milestones ordered by due date
/// GET /milestones/student/:student_id
async fn list_student_milestones(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(student_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Milestone>>>> {
    let milestones = state
        .milestone_service
        .list_student_milestones(&user, &student_id)
        .await?;

    Ok(Json(ApiResponse::success(milestones)))
}
