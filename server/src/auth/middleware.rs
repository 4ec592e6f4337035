//! Authentication middleware.
//!
//! The bearer token is taken as the id of the user whose collection the
//! request reads or writes. Token validation belongs to the deployment's
//! gateway; this server only requires that one is present.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use crate::AppState;

/// Authenticated user extracted from request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Owner of every row the request touches
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) => {
                let token = header
                    .strip_prefix("Bearer ")
                    .ok_or((StatusCode::UNAUTHORIZED, "Invalid authorization header format"))?
                    .trim();

                if token.is_empty() {
                    return Err((StatusCode::UNAUTHORIZED, "Empty bearer token"));
                }

                Ok(AuthUser {
                    user_id: token.to_string(),
                })
            }
            None => Err((StatusCode::UNAUTHORIZED, "Missing authorization header")),
        }
    }
}
