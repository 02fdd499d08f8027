use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateProductRequest, UpdateProductRequest},
    repo_types::Product,
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, ErrorBody},
    extract::{AppJson, AppPath},
    state::AppState,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    post,
    path = "/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created, owned by the caller", body = Product),
        (status = 400, description = "Invalid product", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
#[instrument(skip(state, payload), fields(user_id = %user.id))]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Product>), AppError> {
    payload.validate()?;
    let product = services::create(&state, payload, user.id).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/v1/products/{}", product.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(product)))
}

#[utoipa::path(
    get,
    path = "/v1/products",
    responses(
        (status = 200, description = "All products", body = [Product]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
#[instrument(skip(state, _user))]
pub async fn list_products(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(services::find_all(&state).await?))
}

#[utoipa::path(
    get,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product", body = Product),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
#[instrument(skip(state, _user))]
pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(services::find_one(&state, id).await?))
}

#[utoipa::path(
    patch,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = Product),
        (status = 400, description = "Invalid patch", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the owner or an admin", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
#[instrument(skip(state, payload), fields(user_id = %user.id))]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    payload.validate()?;
    Ok(Json(services::update(&state, id, payload, &user).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the owner or an admin", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    services::remove(&state, id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
