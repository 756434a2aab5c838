use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::app::dto::{self, Envelope, ProductResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListProductsQuery>,
) -> axum::response::Response {
    match services.catalog.list_products(query.to_request()).await {
        Ok(page) => (StatusCode::OK, Json(dto::product_page(page))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.catalog.get_product(&id).await {
        Ok(product) => (
            StatusCode::OK,
            Json(Envelope::data(ProductResponse::from(product))),
        )
            .into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
