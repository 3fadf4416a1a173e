/// Student dashboard
///
/// ```text
/// GET /student/dashboard
/// Authorization: Bearer <student token>
/// ```
///
/// ```json
/// { "student": {...}, "houseSpirit": {...} | null, "results": [...] }
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use housepoints_shared::{
    auth::token::Claims,
    models::{house_spirit::HouseSpirit, result::ActivityResult, student::Student},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub student: Student,

    /// `None` when the student has no house
    pub house_spirit: Option<HouseSpirit>,

    /// Newest first
    pub results: Vec<ActivityResult>,
}

/// Returns the signed-in student's record, house and results
///
/// # Errors
///
/// - `404 Not Found`: the account has no linked student record
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<StudentDashboard>> {
    let student = state
        .store
        .find_student_by_user_id(claims.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No student record is linked to this account".to_string()))?;

    let house_spirit = match student.house_spirit_id {
        Some(house_id) => state.store.find_house_spirit(house_id).await?,
        None => None,
    };

    let results = state.store.list_results_by_student(student.id).await?;

    Ok(Json(StudentDashboard {
        student,
        house_spirit,
        results,
    }))
}
