/// Standings maintenance for administrators
///
/// ```text
/// GET  /admin/standings/drift       recount only
/// POST /admin/standings/reconcile   recount and overwrite drifted totals
/// ```
///
/// Both return a [`StandingReport`]:
///
/// ```json
/// {
///   "houses": [{ "house_id": "uuid", "name": "Phoenix", "recorded": 12, "computed": 10 }],
///   "repaired": false
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use housepoints_shared::{auth::token::Claims, standings::StandingReport};

pub async fn drift(State(state): State<AppState>) -> ApiResult<Json<StandingReport>> {
    Ok(Json(state.standings.detect_drift().await?))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<StandingReport>> {
    tracing::info!(user_id = %claims.id, "Standings reconciliation requested");
    Ok(Json(state.standings.recompute_all().await?))
}
