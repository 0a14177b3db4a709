use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::WithRejection;
use service_core::error::AppError;
use service_core::utils::ValidatedJson;

use crate::models::{Item, ItemBase};
use crate::services::StoreError;
use crate::startup::AppState;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(anyhow::anyhow!("Item not found")),
        }
    }
}

type ItemId = WithRejection<Path<i64>, AppError>;

#[tracing::instrument(skip_all)]
pub async fn create_item(
    State(state): State<AppState>,
    ValidatedJson(item): ValidatedJson<ItemBase>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.store.create(item).await;
    tracing::info!(item_id = created.id, name = %created.name, "Created item");
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip_all)]
pub async fn list_items(State(state): State<AppState>) -> Json<Vec<Item>> {
    Json(state.store.list().await)
}

#[tracing::instrument(skip_all)]
pub async fn get_item(
    State(state): State<AppState>,
    WithRejection(Path(item_id), _): ItemId,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.store.get(item_id).await?))
}

#[tracing::instrument(skip_all)]
pub async fn update_item(
    State(state): State<AppState>,
    WithRejection(Path(item_id), _): ItemId,
    ValidatedJson(updated): ValidatedJson<ItemBase>,
) -> Result<Json<Item>, AppError> {
    let item = state.store.replace(item_id, updated).await?;
    tracing::info!(item_id, "Replaced item");
    Ok(Json(item))
}

#[tracing::instrument(skip_all)]
pub async fn delete_item(
    State(state): State<AppState>,
    WithRejection(Path(item_id), _): ItemId,
) -> Result<StatusCode, AppError> {
    state.store.delete(item_id).await?;
    tracing::info!(item_id, "Deleted item");
    Ok(StatusCode::NO_CONTENT)
}
