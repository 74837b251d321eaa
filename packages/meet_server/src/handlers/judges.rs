use axum::{Json, extract::State, http::StatusCode};
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::models::{LoginRequest, LoginResponse};

/// Resolve a PIN to a judge seat. Unlike scoring, a bad PIN here is 401.
pub async fn login_judge(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    match state.service.login_judge(&req.pin) {
        Ok(seat) => {
            info!(seat = seat.number(), "judge logged in");
            Ok(Json(LoginResponse {
                message: "Login successful".to_string(),
                judge_id: seat.display_name(),
                seat: seat.number(),
            }))
        }
        Err(_) => {
            warn!("judge login with unknown PIN");
            Err(ApiError::status(
                StatusCode::UNAUTHORIZED,
                "invalid_pin",
                "Invalid PIN",
            ))
        }
    }
}
