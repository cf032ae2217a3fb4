use actix_web::web;
use log::error;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::store::{SharedStore, Store, StoreError};

pub mod appointments;
pub mod assistant;
pub mod directory;
pub mod identity;

pub use appointments::AppointmentService;
pub use assistant::AssistantService;
pub use directory::DirectoryService;
pub use identity::IdentityService;

/// Runs a store call on the blocking thread pool.
pub(crate) async fn blocking<T, F>(store: &SharedStore, op: F) -> Result<Result<T, StoreError>, ApiError>
where
    F: FnOnce(&dyn Store) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    web::block(move || op(store.as_ref())).await.map_err(|e| {
        error!("Database operation error: {}", e);
        ApiError::DatabaseError(e.to_string())
    })
}

/// Like [`blocking`], with store failures converted into API errors.
pub(crate) async fn with_store<T, F>(store: &SharedStore, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn Store) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    Ok(blocking(store, op).await??)
}

/// A required free-text field, kept exactly as supplied. Whitespace alone
/// counts as missing.
pub(crate) fn supplied_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::ValidationError(format!("{} is required", field))),
    }
}

/// Trimmed value of a required text field.
pub(crate) fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::ValidationError(format!("{} is required", field))),
    }
}
