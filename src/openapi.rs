use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, error, health, products, users};

/// OpenAPI document served at `/v1/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::handlers::register,
        auth::handlers::login,
        users::handlers::list_users,
        products::handlers::create_product,
        products::handlers::list_products,
        products::handlers::get_product,
        products::handlers::update_product,
        products::handlers::delete_product,
        health::healthz,
    ),
    components(
        schemas(
            auth::dto::RegisterRequest,
            auth::dto::LoginRequest,
            auth::dto::AccessTokenResponse,
            auth::dto::PublicUser,
            auth::repo_types::Role,
            products::dto::CreateProductRequest,
            products::dto::UpdateProductRequest,
            products::repo_types::Product,
            health::HealthResponse,
            error::ErrorBody,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "User administration"),
        (name = "products", description = "Product catalog"),
        (name = "health", description = "Health check endpoints"),
    ),
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = "Product catalog with role and ownership based access control",
    ),
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
