use axum::{Json, extract::State};

use crate::AppState;
use crate::error::ApiError;
use crate::export::MeetExport;
use crate::service::ServiceError;

/// Build both CSV documents, write them to the exports directory and return
/// them with the paths they were written to.
pub async fn export_meet_data(State(state): State<AppState>) -> Result<Json<MeetExport>, ApiError> {
    let mut export = state.service.export().await?;
    export
        .write_to(&state.config.exports_dir)
        .map_err(ServiceError::from)?;
    Ok(Json(export))
}
