use crate::{
    error::Result,
    models::{milestone::*, response::ApiResponse, student::Student},
    services::auth::{AuthUser, Role},
    state::AppState,
    utils::extract::{AppJson, OptionalAppJson},
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pending-milestones", get(pending_milestones))
        .route("/students", get(list_advisees))
        .route("/milestone/:id/feedback", post(add_feedback))
        .route("/milestone/:id/approve", post(approve_milestone))
        .route("/milestone/:id/verify", post(verify_milestone))
        .route("/milestone/:id/request-changes", post(request_changes))
}

/// Pending milestones across the advisor's students
/// GET /advisor/pending-milestones
async fn pending_milestones(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<PendingMilestone>>>> {
    user.require_role(Role::Advisor)?;

    let pending = state.milestone_service.pending_milestones(&user).await?;
    Ok(Json(ApiResponse::success(pending)))
}

/// Students assigned to the advisor
/// GET /advisor/students
async fn list_advisees(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Student>>>> {
    let students = state.student_service.list_advisees(&user).await?;
    Ok(Json(ApiResponse::success(students)))
}

/// Leave feedback on a milestone
/// POST /advisor/milestone/:id/feedback
async fn add_feedback(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(milestone_id): Path<String>,
    AppJson(request): AppJson<FeedbackRequest>,
) -> Result<Json<ApiResponse<Milestone>>> {
    user.require_role(Role::Advisor)?;
    debug!("Advisor {} leaving feedback on milestone {}", user.id, milestone_id);

    let milestone = state
        .milestone_service
        .add_feedback(&user, &milestone_id, request)
        .await?;

    Ok(Json(ApiResponse::success_with_message(milestone, "Feedback saved")))
}

/// Approve a milestone awaiting review
/// POST /advisor/milestone/:id/approve
async fn approve_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(milestone_id): Path<String>,
    OptionalAppJson(request): OptionalAppJson<ReviewRequest>,
) -> Result<Json<ApiResponse<Milestone>>> {
    user.require_role(Role::Advisor)?;
    debug!("Advisor {} approving milestone {}", user.id, milestone_id);

    let request = request.unwrap_or_default();
    let milestone = state
        .milestone_service
        .approve_milestone(&user, &milestone_id, request)
        .await?;

    Ok(Json(ApiResponse::success_with_message(milestone, "Milestone approved")))
}

/// Verify a milestone as completed
/// POST /advisor/milestone/:id/verify
async fn verify_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(milestone_id): Path<String>,
    OptionalAppJson(request): OptionalAppJson<ReviewRequest>,
) -> Result<Json<ApiResponse<Milestone>>> {
    user.require_role(Role::Advisor)?;
    debug!("Advisor {} verifying milestone {}", user.id, milestone_id);

    let request = request.unwrap_or_default();
    let milestone = state
        .milestone_service
        .verify_milestone(&user, &milestone_id, request)
        .await?;

    Ok(Json(ApiResponse::success_with_message(milestone, "Milestone verified")))
}

/// Send a milestone back to the student with feedback
/// POST /advisor/milestone/:id/request-changes
async fn request_changes(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(milestone_id): Path<String>,
    AppJson(request): AppJson<FeedbackRequest>,
) -> Result<Json<ApiResponse<Milestone>>> {
    user.require_role(Role::Advisor)?;
    debug!("Advisor {} requesting changes on milestone {}", user.id, milestone_id);

    let milestone = state
        .milestone_service
        .request_changes(&user, &milestone_id, request)
        .await?;

    Ok(Json(ApiResponse::success_with_message(milestone, "Changes requested")))
}
