use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AccessTokenResponse, LoginRequest, PublicUser, RegisterRequest},
        services,
    },
    error::{AppError, ErrorBody},
    extract::AppJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = PublicUser),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    payload.validate()?;
    let user =
        services::register(&state, &payload.name, &payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = AccessTokenResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    payload.validate()?;
    let token = services::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(token))
}
