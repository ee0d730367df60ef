use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// The capability hash presented with every scoped request, extracted from
/// the `X-Access-Key-Hash` header. The value is a one-way digest computed
/// client-side; the server never sees raw keys. Implements axum's
/// FromRequestParts for use as an extractor.
#[derive(Debug, Clone)]
pub struct AccessKeyHash(pub String);

impl<S> FromRequestParts<S> for AccessKeyHash
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let hash = parts
            .headers
            .get("x-access-key-hash")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::MissingAccessKey)?;

        Ok(AccessKeyHash(hash.to_string()))
    }
}
