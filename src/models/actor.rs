//! Caller identity as seen by the engine
//!
//! Identity is resolved and authenticated upstream; the engine only receives
//! a resolved actor and re-validates stage eligibility itself, because the
//! scheduler path has no upstream caller at all.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::enums::Role;

/// A resolved caller: a human user, or the system sentinel for
/// scheduler-originated transitions (`id = None`, audited as actor NULL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<i32>,
    pub role: Role,
    pub department_id: Option<i32>,
    pub section_id: Option<i32>,
}

impl Actor {
    /// The sentinel actor for time-driven transitions
    pub fn system() -> Self {
        Self {
            id: None,
            role: Role::Admin,
            department_id: None,
            section_id: None,
        }
    }

    /// Identity of a human caller, required for requester-facing operations
    pub fn user_id(&self) -> AppResult<i32> {
        self.id
            .ok_or_else(|| AppError::Validation("caller identity required".to_string()))
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("administrator role required".to_string()))
        }
    }

    pub fn require_technician(&self) -> AppResult<()> {
        if matches!(self.role, Role::Admin | Role::Technician) {
            Ok(())
        } else {
            Err(AppError::Forbidden("technician role required".to_string()))
        }
    }
}

/// JWT claims carried by inbound requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: i16,
    pub department_id: Option<i32>,
    pub section_id: Option<i32>,
    pub exp: i64,
    pub iat: i64,
}

impl ActorClaims {
    /// Create a new JWT token (used by tests and upstream tooling)
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

impl From<ActorClaims> for Actor {
    fn from(claims: ActorClaims) -> Self {
        Self {
            id: Some(claims.user_id),
            role: Role::from(claims.role),
            department_id: claims.department_id,
            section_id: claims.section_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_actor_has_no_user_id() {
        let system = Actor::system();
        assert_eq!(system.id, None);
        assert!(system.user_id().is_err());
    }

    #[test]
    fn claims_resolve_into_actor() {
        let claims = ActorClaims {
            sub: "somchai".to_string(),
            user_id: 7,
            role: 1,
            department_id: Some(3),
            section_id: None,
            exp: 0,
            iat: 0,
        };
        let actor = Actor::from(claims);
        assert_eq!(actor.id, Some(7));
        assert_eq!(actor.role, Role::Hod);
        assert_eq!(actor.department_id, Some(3));
    }
}
