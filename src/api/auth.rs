//! Identity context: resolves a bearer credential to `(user, role)`.
//!
//! Token issuance lives outside this service; the extractor only verifies the
//! signature and looks the caller up in the `users` table, which stays the
//! source of truth for the role.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::roles::{role_allows, Capability, Role};

use super::error::ApiError;
use super::types::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if role_allows(self.role, capability) {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "You do not have permission to perform this action",
            ))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("Not authorized. Token missing"))?;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::unauthorized("Token invalid or expired"))?
        .claims;

        let conn = state.db.lock().await;
        let row = conn
            .query_row(
                "SELECT name, role FROM users WHERE id = ?",
                [&claims.sub],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some((name, role_raw)) = row else {
            return Err(ApiError::unauthorized("User no longer exists"));
        };
        let role = Role::parse(&role_raw)
            .ok_or_else(|| ApiError::internal(anyhow::anyhow!("unknown role in users table: {role_raw}")))?;

        Ok(Identity {
            user_id: claims.sub,
            name,
            role,
        })
    }
}
