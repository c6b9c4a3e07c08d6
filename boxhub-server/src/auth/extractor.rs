//! JWT Extractor
//!
//! Handlers take [`CurrentUser`] as an argument; the value normally comes
//! from the auth middleware, with token validation here as a fallback.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use shared::error::{AppError, ErrorCode};

use crate::auth::{CurrentUser, JwtError, JwtService};
use crate::core::ServerState;
use crate::security_log;

impl FromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        // Already extracted by middleware
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = match auth_header {
            Some(header) => JwtService::extract_from_header(header)
                .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
            None => {
                security_log!("WARN", "auth_missing", uri = format!("{:?}", parts.uri));
                return Err(AppError::unauthorized());
            }
        };

        let user = authenticate(&state.jwt_service, token, &parts.uri)?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Optional identity on public routes: no header means anonymous, a bad
/// token is still rejected
impl OptionalFromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(http::header::AUTHORIZATION)
            && parts.extensions.get::<CurrentUser>().is_none()
        {
            return Ok(None);
        }
        <CurrentUser as FromRequestParts<ServerState>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

/// Validate a bearer token into a [`CurrentUser`]
pub(crate) fn authenticate(
    jwt_service: &JwtService,
    token: &str,
    uri: &http::Uri,
) -> Result<CurrentUser, AppError> {
    let claims = jwt_service.validate_token(token).map_err(|e| {
        security_log!(
            "WARN",
            "auth_failed",
            error = format!("{}", e),
            uri = format!("{:?}", uri)
        );
        match e {
            JwtError::ExpiredToken => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })?;

    CurrentUser::try_from(claims)
        .map_err(|e| AppError::invalid_token(format!("Malformed JWT claims: {}", e)))
}

/// Verified-email gate for purchase routes
pub fn require_verified(user: &CurrentUser) -> Result<(), AppError> {
    if user.verified || user.is_admin() {
        return Ok(());
    }
    security_log!("WARN", "unverified_access", user_id = user.id.clone());
    Err(AppError::with_message(
        ErrorCode::EmailNotVerified,
        "Please verify your email address first",
    ))
}
