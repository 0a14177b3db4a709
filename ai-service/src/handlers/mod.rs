//! HTTP handlers for the AI service.

pub mod chat;
pub mod generate;
pub mod health;
pub mod stream;

use crate::services::ProviderError;
use service_core::error::AppError;

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::BadGateway(err.to_string())
    }
}
