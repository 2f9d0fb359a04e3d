//! Request identity

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Identity of the requesting user, taken from the X-User-Id header.
///
/// A missing or blank header falls back to a fixed dev user; every query
/// is scoped by this value.
#[derive(Clone, Debug)]
pub struct Owner(pub String);

const DEV_USER: &str = "dev-user";

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEV_USER)
            .to_string();

        Ok(Owner(owner))
    }
}
