use axum::{
    http::{HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::app::errors;
use crate::context::CallerContext;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Attach a [`CallerContext`] to every request.
///
/// Authentication is out of scope: the caller names itself through
/// `X-User-Id`, and requests without one get a generated identity.
pub async fn caller_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let caller = match extract_user_id(req.headers()) {
        Ok(Some(user_id)) => CallerContext::new(user_id),
        Ok(None) => CallerContext::anonymous(),
        Err(response) => return response,
    };

    req.extensions_mut().insert(caller);
    next.run(req).await
}

fn extract_user_id(headers: &HeaderMap) -> Result<Option<String>, Response> {
    let Some(header) = headers.get(&USER_ID_HEADER) else {
        return Ok(None);
    };

    let value = header.to_str().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            "X-User-Id must be a UUID",
        )
    })?;

    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value.to_string()))
}
