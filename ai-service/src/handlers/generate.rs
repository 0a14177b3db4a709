use axum::{extract::State, Json};
use service_core::error::AppError;
use service_core::utils::ValidatedJson;

use crate::models::{GenerateRequest, GenerateResponse};
use crate::startup::AppState;

#[tracing::instrument(skip_all)]
pub async fn generate_text(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let response = state
        .text_provider
        .generate(&req.prompt, req.model.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Generation failed");
            AppError::from(e)
        })?;

    tracing::info!(
        prompt_len = req.prompt.len(),
        response_len = response.len(),
        "Generated text"
    );

    Ok(Json(GenerateResponse {
        prompt: req.prompt,
        response,
    }))
}
