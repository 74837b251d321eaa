use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use meet_model::{Lifter, NewLifter};

use crate::AppState;
use crate::error::ApiError;
use crate::models::{AgeClassRef, WeightClassRef};

pub async fn list_lifters(State(state): State<AppState>) -> Result<Json<Vec<Lifter>>, ApiError> {
    Ok(Json(state.service.list_lifters().await?))
}

pub async fn create_lifter(
    State(state): State<AppState>,
    Json(new): Json<NewLifter>,
) -> Result<(StatusCode, Json<Lifter>), ApiError> {
    let lifter = state.service.create_lifter(new).await?;
    Ok((StatusCode::CREATED, Json(lifter)))
}

pub async fn add_additional_weight_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<WeightClassRef>,
) -> Result<Json<Lifter>, ApiError> {
    Ok(Json(
        state
            .service
            .add_additional_weight_class(id, req.weight_class_id)
            .await?,
    ))
}

pub async fn remove_additional_weight_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<WeightClassRef>,
) -> Result<Json<Lifter>, ApiError> {
    Ok(Json(
        state
            .service
            .remove_additional_weight_class(id, req.weight_class_id)
            .await?,
    ))
}

pub async fn add_additional_age_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AgeClassRef>,
) -> Result<Json<Lifter>, ApiError> {
    Ok(Json(
        state
            .service
            .add_additional_age_class(id, req.age_class_id)
            .await?,
    ))
}

pub async fn remove_additional_age_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AgeClassRef>,
) -> Result<Json<Lifter>, ApiError> {
    Ok(Json(
        state
            .service
            .remove_additional_age_class(id, req.age_class_id)
            .await?,
    ))
}
