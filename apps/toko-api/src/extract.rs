//! Acting-user extraction.
//!
//! Authentication happens in the proxy in front of this server. It forwards
//! the verified identity as two headers:
//!
//! ```text
//! x-user-id:   kasir-07
//! x-user-role: cashier | admin
//! ```

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use toko_core::{Actor, Role};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The user a request acts as.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthenticated(format!("missing {USER_ID_HEADER} header")))?;

        let role: Role = header(parts, USER_ROLE_HEADER)
            .ok_or_else(|| ApiError::unauthenticated(format!("missing {USER_ROLE_HEADER} header")))?
            .parse()
            .map_err(|e: toko_core::ValidationError| ApiError::unauthenticated(e.to_string()))?;

        Ok(CurrentActor(Actor::new(user_id, role)))
    }
}
