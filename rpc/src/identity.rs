//! Caller identity.
//!
//! Authentication happens upstream; the authenticated user id arrives in
//! the `x-user-id` header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use shield_types::UserId;

use crate::RpcError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallerId(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = RpcError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(RpcError::Unauthenticated)?
            .to_str()
            .map_err(|_| RpcError::Unauthenticated)?;
        raw.parse::<UserId>()
            .map(CallerId)
            .map_err(|_| RpcError::Unauthenticated)
    }
}
