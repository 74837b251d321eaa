use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use meet_model::{AgeClass, NewAgeClass, NewWeightClass, WeightClass};

use crate::AppState;
use crate::error::ApiError;
use crate::models::MessageResponse;

pub async fn list_weight_classes(
    State(state): State<AppState>,
) -> Result<Json<Vec<WeightClass>>, ApiError> {
    Ok(Json(state.service.list_weight_classes().await?))
}

pub async fn create_weight_class(
    State(state): State<AppState>,
    Json(new): Json<NewWeightClass>,
) -> Result<(StatusCode, Json<WeightClass>), ApiError> {
    let class = state.service.create_weight_class(new).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

pub async fn delete_weight_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.service.delete_weight_class(id).await?;
    Ok(Json(MessageResponse::new("Weight class deleted")))
}

pub async fn list_age_classes(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgeClass>>, ApiError> {
    Ok(Json(state.service.list_age_classes().await?))
}

pub async fn create_age_class(
    State(state): State<AppState>,
    Json(new): Json<NewAgeClass>,
) -> Result<(StatusCode, Json<AgeClass>), ApiError> {
    let class = state.service.create_age_class(new).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

pub async fn delete_age_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.service.delete_age_class(id).await?;
    Ok(Json(MessageResponse::new("Age class deleted")))
}
