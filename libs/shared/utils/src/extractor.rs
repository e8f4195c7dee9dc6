use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
    body::Body,
};

use shared_models::auth::RequestIdentity;
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Pull the bearer token out of the headers, `Ok(None)` when there is no
/// `Authorization` header at all.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(auth_header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::AuthRequired("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| AppError::AuthRequired("Invalid authorization header format".to_string()))
}

fn resolve_identity(config: &AppConfig, headers: &HeaderMap) -> Result<RequestIdentity, AppError> {
    match bearer_token(headers)? {
        Some(token) => {
            let user = validate_token(token, &config.supabase_jwt_secret)
                .map_err(AppError::AuthRequired)?;
            Ok(RequestIdentity::authenticated(user, token))
        }
        None => Ok(RequestIdentity::anonymous()),
    }
}

/// Rejects requests without a valid bearer token.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve_identity(&config, request.headers())?;

    let user = identity
        .user()
        .cloned()
        .ok_or_else(|| AppError::AuthRequired("Missing authorization header".to_string()))?;

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Lets anonymous requests through but still rejects a bad token. Handlers
/// read the outcome from the `RequestIdentity` extension.
pub async fn identity_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve_identity(&config, request.headers())?;

    if let Some(user) = identity.user().cloned() {
        request.extensions_mut().insert(user);
    }
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Extension, Router};
    use shared_models::auth::User;
    use tower::ServiceExt;

    use crate::test_utils::{JwtTestUtils, TestConfig, TestUser};

    fn app(config: Arc<AppConfig>) -> Router {
        let protected = Router::new()
            .route("/me", get(|Extension(user): Extension<User>| async move { user.id }))
            .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

        let open = Router::new()
            .route(
                "/whoami",
                get(|Extension(identity): Extension<RequestIdentity>| async move {
                    identity.user().map(|u| u.id.clone()).unwrap_or_else(|| "anonymous".to_string())
                }),
            )
            .layer(middleware::from_fn_with_state(config, identity_middleware));

        protected.merge(open)
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let config = TestConfig::default().to_arc();
        let response = app(config)
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_route_accepts_valid_token() {
        let test_config = TestConfig::default();
        let user = TestUser::patient("patient@example.com");
        let token = JwtTestUtils::create_test_token(&user, &test_config.jwt_secret, None);

        let response = app(test_config.to_arc())
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_open_route_allows_anonymous() {
        let response = app(TestConfig::default().to_arc())
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_open_route_rejects_bad_token() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_invalid_signature_token(&user);

        let response = app(TestConfig::default().to_arc())
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
