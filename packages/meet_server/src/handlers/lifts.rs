use axum::{
    Json,
    extract::{Path, State},
};

use meet_model::Lift;

use crate::AppState;
use crate::error::ApiError;
use crate::models::ScoreRequest;

pub async fn list_lifts(State(state): State<AppState>) -> Result<Json<Vec<Lift>>, ApiError> {
    Ok(Json(state.service.list_lifts().await?))
}

/// Record one judge's decision. An unknown PIN is 403.
pub async fn score_lift(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<Lift>, ApiError> {
    Ok(Json(
        state
            .service
            .score_lift(id, &req.judge_pin, req.score)
            .await?,
    ))
}
