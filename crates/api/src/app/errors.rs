use axum::http::StatusCode;
use axum::response::IntoResponse;

use tenure_infra::{CatalogError, StoreError};
use tracing::error;

use crate::app::dto::Envelope;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (status, axum::Json(Envelope::error(code, message))).into_response()
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "subscription not found"),
        StoreError::InvalidIdentifier(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        e @ (StoreError::ProductRequired | StoreError::InvalidProductDuration(_)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_product", e.to_string())
        }
        e @ (StoreError::CannotPause(_) | StoreError::CannotUnpause(_) | StoreError::CannotCancel) => {
            json_error(StatusCode::CONFLICT, "invalid_state", e.to_string())
        }
        e @ StoreError::ConcurrentModification { .. } => {
            json_error(StatusCode::CONFLICT, "concurrent_modification", e.to_string())
        }
        e @ (StoreError::Consistency(_) | StoreError::Database(_)) => internal_error(e),
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        CatalogError::InvalidIdentifier(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        e @ (CatalogError::InvalidProduct(_) | CatalogError::Database(_)) => internal_error(e),
    }
}

/// Internal faults are logged in full; the caller gets a generic message.
fn internal_error(err: impl std::fmt::Display) -> axum::response::Response {
    error!(error = %err, "request failed");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}
