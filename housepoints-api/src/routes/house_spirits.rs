/// House standings listing
///
/// ```text
/// GET /house-spirits
/// ```
///
/// Any signed-in role; highest total first, ties by name.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use housepoints_shared::models::house_spirit::HouseSpirit;

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<HouseSpirit>>> {
    Ok(Json(state.standings.standings().await?))
}
