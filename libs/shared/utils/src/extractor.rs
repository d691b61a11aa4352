use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::PatientId;

use crate::identity::{resolve_patient_id, IdentityError};
use crate::jwt::validate_token;

// Validates the bearer token and stashes the caller's identity for handlers.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| IdentityError::Unauthenticated("Missing or invalid authorization header".to_string()))?;

    let user = validate_token(bearer.token(), &config.jwt_secret)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// The patient on whose behalf the request acts, resolved from the token
/// subject placed in the request extensions by [`auth_middleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedPatient(pub PatientId);

impl<S> FromRequestParts<S> for AuthenticatedPatient
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<User>()
            .ok_or_else(|| IdentityError::Unauthenticated("User not found in request extensions".to_string()))?;

        Ok(Self(resolve_patient_id(user)?))
    }
}
