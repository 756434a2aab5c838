//! Subscription endpoints.
//!
//! Mutations are conditional: the caller must send the version it last saw in
//! `If-Match` (as returned in the `version` field or the `ETag` header).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, patch, post},
};

use tenure_core::{ExpectedVersion, Version, VersionParseError};
use tenure_infra::StoreError;
use tenure_subscriptions::{Subscription, Transition};

use crate::app::dto::{Envelope, SubscriptionResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id", post(create_subscription).get(get_subscription).delete(cancel_subscription))
        .route("/:id/pause", patch(pause_subscription))
        .route("/:id/unpause", patch(unpause_subscription))
}

/// `POST /subscriptions/{product_id}`
pub async fn create_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product = match services.catalog.get_product(&product_id).await {
        Ok(product) => product,
        Err(e) => return errors::catalog_error_to_response(e),
    };

    match services
        .subscriptions
        .create(caller.user_id(), Some(&product))
        .await
    {
        Ok(subscription) => subscription_response(StatusCode::CREATED, subscription),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.subscriptions.get(&id).await {
        Ok(subscription) => subscription_response(StatusCode::OK, subscription),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn pause_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    apply_transition(&services, &id, &headers, Transition::Pause).await
}

pub async fn unpause_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    apply_transition(&services, &id, &headers, Transition::Unpause).await
}

pub async fn cancel_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    apply_transition(&services, &id, &headers, Transition::Cancel).await
}

async fn apply_transition(
    services: &AppServices,
    id: &str,
    headers: &HeaderMap,
    transition: Transition,
) -> axum::response::Response {
    let expected = match expected_version(headers) {
        Ok(expected) => expected,
        Err(response) => return response,
    };

    let store = &services.subscriptions;
    let result: Result<Subscription, StoreError> = match transition {
        Transition::Pause => store.pause(id, expected).await,
        Transition::Unpause => store.unpause(id, expected).await,
        Transition::Cancel => store.cancel(id, expected).await,
    };

    match result {
        Ok(subscription) => subscription_response(StatusCode::OK, subscription),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Read the caller's expected version from `If-Match`.
///
/// Accepts `3`, `"3"` and `W/"3"`.
fn expected_version(headers: &HeaderMap) -> Result<ExpectedVersion, axum::response::Response> {
    let Some(raw) = headers.get(header::IF_MATCH) else {
        return Err(errors::json_error(
            StatusCode::PRECONDITION_REQUIRED,
            "precondition_required",
            "If-Match header with the current subscription version is required",
        ));
    };

    raw.to_str()
        .map_err(|_| VersionParseError::NotNumeric("<non-ascii>".to_string()))
        .and_then(parse_etag)
        .map(ExpectedVersion::exact)
        .map_err(|e| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_version",
                format!("invalid If-Match header: {e}"),
            )
        })
}

fn parse_etag(raw: &str) -> Result<Version, VersionParseError> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    let raw = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    raw.parse()
}

fn subscription_response(status: StatusCode, subscription: Subscription) -> axum::response::Response {
    let etag = HeaderValue::from_str(&format!("\"{}\"", subscription.version.get()));
    let body = Json(Envelope::data(SubscriptionResponse::from(subscription)));

    match etag {
        Ok(etag) => (status, [(header::ETAG, etag)], body).into_response(),
        Err(_) => (status, body).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(if_match: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = if_match {
            headers.insert(header::IF_MATCH, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn etag_forms_are_accepted() {
        assert_eq!(parse_etag("3"), Ok(Version::new(3).unwrap()));
        assert_eq!(parse_etag("\"3\""), Ok(Version::new(3).unwrap()));
        assert_eq!(parse_etag("W/\"12\""), Ok(Version::new(12).unwrap()));
    }

    #[test]
    fn malformed_etags_are_rejected() {
        assert!(parse_etag("*").is_err());
        assert!(parse_etag("\"0\"").is_err());
        assert!(parse_etag("abc").is_err());
    }

    #[test]
    fn missing_if_match_is_precondition_required() {
        let response = expected_version(&headers(None)).unwrap_err();
        assert_eq!(response.status(), StatusCode::PRECONDITION_REQUIRED);
    }

    #[test]
    fn malformed_if_match_is_bad_request() {
        let response = expected_version(&headers(Some("v1"))).unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
