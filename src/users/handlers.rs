use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::PublicUser,
        extractors::{AdminOnly, RequireRole},
    },
    error::{AppError, ErrorBody},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}

/// GET /users, admins only.
#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "All users, without credentials", body = [PublicUser]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    RequireRole(admin, _): RequireRole<AdminOnly>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users: Vec<PublicUser> = state
        .users
        .list()
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();
    info!(admin_id = %admin.id, count = users.len(), "users listed");
    Ok(Json(users))
}
