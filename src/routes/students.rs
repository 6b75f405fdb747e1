use crate::{
    error::Result,
    models::{response::ApiResponse, student::*},
    services::auth::AuthUser,
    state::AppState,
    utils::extract::AppJson,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:id", get(get_student).put(upsert_student))
}

/// GET /students/:id
async fn get_student(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(student_id): Path<String>,
) -> Result<Json<ApiResponse<Student>>> {
    let student = state.student_service.get_student(&user, &student_id).await?;
    Ok(Json(ApiResponse::success(student)))
}

/// Register a student or change their advisor (admin only)
/// PUT /students/:id
async fn upsert_student(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(student_id): Path<String>,
    AppJson(request): AppJson<UpsertStudentRequest>,
) -> Result<Json<ApiResponse<Student>>> {
    let student = state
        .student_service
        .upsert_student(&user, &student_id, request)
        .await?;

    Ok(Json(ApiResponse::success(student)))
}
