/// Teacher dashboard and result recording
///
/// Every handler here sits behind the teacher/admin guard and passes the
/// verified [`Claims`] on to the result ledger, which checks ownership.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use housepoints_shared::{
    auth::token::Claims,
    ledger::ResultSubmission,
    models::{
        house_spirit::HouseSpirit, result::ActivityResult, student::Student,
        teacher::TeacherProfile,
    },
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherDashboard {
    pub students: Vec<Student>,
    pub house_spirits: Vec<HouseSpirit>,

    /// Results this teacher recorded, newest first
    pub recent_results: Vec<ActivityResult>,

    /// `None` for accounts without a profile, e.g. admins
    pub teacher_profile: Option<TeacherProfile>,
}

/// `GET /teacher/dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<TeacherDashboard>> {
    let students = state.ledger.list_all_students(&claims).await?;
    let house_spirits = state.ledger.list_standings(&claims).await?;
    let recent_results = state.ledger.list_recent_by_teacher(&claims).await?;
    let teacher_profile = state.store.find_teacher_profile(claims.id).await?;

    Ok(Json(TeacherDashboard {
        students,
        house_spirits,
        recent_results,
        teacher_profile,
    }))
}

/// `POST /teacher/results`
///
/// ```json
/// { "student_id": "uuid", "activity_name": "Potions exam", "score": 88.5, "house_spirit_points": 5 }
/// ```
///
/// `house_spirit_points` defaults to 0. Responds `201 Created` with the result.
pub async fn create_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<ResultSubmission>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ActivityResult>)> {
    let Json(submission) = payload?;
    let result = state.ledger.create_result(&claims, submission).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// `PUT /teacher/results/:id`
///
/// Partial: omitted fields, including `house_spirit_points`, keep their
/// stored values.
pub async fn update_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ResultSubmission>, JsonRejection>,
) -> ApiResult<Json<ActivityResult>> {
    let Path(result_id) = path?;
    let Json(submission) = payload?;
    let result = state
        .ledger
        .update_result(&claims, result_id, submission)
        .await?;
    Ok(Json(result))
}

/// `DELETE /teacher/results/:id`, responds `204 No Content`
pub async fn delete_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(result_id) = path?;
    state.ledger.delete_result(&claims, result_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
