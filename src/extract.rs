//! `Json` and `Path` wrappers whose rejections go through `AppError`.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// JSON request body.
#[derive(Debug)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

/// Path parameters.
#[derive(Debug)]
pub struct AppPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) =
            axum::extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(AppPath(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header::CONTENT_TYPE};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Body1 {
        n: u32,
    }

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_json_becomes_validation_error() {
        for body in [r#"{"n": 1, "extra": true}"#, r#"{"n": "one"}"#, "{not json"] {
            let res = AppJson::<Body1>::from_request(json_request(body), &()).await;
            assert!(matches!(res, Err(AppError::Validation(_))), "{body}");
        }
    }

    #[tokio::test]
    async fn missing_content_type_becomes_validation_error() {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"n": 1}"#))
            .unwrap();
        let res = AppJson::<Body1>::from_request(req, &()).await;
        assert!(matches!(res, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn well_formed_json_passes_through() {
        let AppJson(body) = AppJson::<Body1>::from_request(json_request(r#"{"n": 7}"#), &())
            .await
            .unwrap();
        assert_eq!(body.n, 7);
    }
}
