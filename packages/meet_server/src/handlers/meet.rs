use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

use meet_link::protocol::SetActiveLift;
use meet_model::MeetState;

use crate::AppState;
use crate::error::ApiError;
use crate::models::{DisplayModeRequest, MeetStateUpdate, MessageResponse};

pub async fn get_meet_state(State(state): State<AppState>) -> Result<Json<MeetState>, ApiError> {
    Ok(Json(state.service.meet_state().await?))
}

pub async fn update_meet_state(
    State(state): State<AppState>,
    Json(update): Json<MeetStateUpdate>,
) -> Result<Json<MeetState>, ApiError> {
    Ok(Json(state.service.update_meet_state(update).await?))
}

pub async fn advance_attempt(State(state): State<AppState>) -> Result<Json<MeetState>, ApiError> {
    Ok(Json(state.service.advance_attempt().await?))
}

pub async fn set_display_mode(
    State(state): State<AppState>,
    Json(req): Json<DisplayModeRequest>,
) -> Result<Json<MeetState>, ApiError> {
    Ok(Json(state.service.set_display_mode(req.mode).await?))
}

/// Body is optional; without a `lift_id` the next lift in the queue is used.
pub async fn set_active_lift(
    State(state): State<AppState>,
    body: Option<Json<SetActiveLift>>,
) -> Result<Response, ApiError> {
    let lift_id = body.and_then(|Json(req)| req.lift_id);
    match state.service.set_active_lift(lift_id).await? {
        Some(lift) => Ok(Json(lift).into_response()),
        None => Ok(Json(MessageResponse::new(
            "No more pending lifts for current attempt/type. Active lift cleared.",
        ))
        .into_response()),
    }
}

/// The lift on the platform, or `{}` when there is none.
pub async fn current_lift(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.service.current_lift().await? {
        Some(lift) => Ok(Json(lift).into_response()),
        None => Ok(Json(serde_json::json!({})).into_response()),
    }
}
