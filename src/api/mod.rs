//! API handlers for Equiptrack REST endpoints
//!
//! Thin adapters only: authentication is resolved upstream and carried as
//! claims; every business rule lives in the services layer, which
//! re-validates eligibility on its own.

pub mod availability;
pub mod devices;
pub mod events;
pub mod health;
pub mod openapi;
pub mod tickets;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use crate::{
    error::AppError,
    models::actor::{Actor, ActorClaims},
    AppState,
};

/// Extractor for the authenticated actor from a JWT bearer token
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        // Check for Bearer token
        if !auth_header.starts_with("Bearer ") {
            return Err(AppError::Authentication("Invalid authorization header format".to_string()));
        }

        let token = &auth_header[7..];

        // Validate JWT token using the secret from configuration
        let claims = ActorClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedActor(Actor::from(claims)))
    }
}
