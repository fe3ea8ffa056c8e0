//! Authorization gate: turns a bearer credential into the caller's user id.
//!
//! Handlers never see the token, only the resolved [`UserId`].

mod jwt;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use uuid::Uuid;

pub use jwt::JwtIdentityResolver;

pub type UserId = Uuid;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingCredentials,
    #[error("Authorization header must use the Bearer scheme")]
    InvalidHeader,
    #[error("Could not validate credentials")]
    InvalidToken,
    #[error("Token has expired")]
    Expired,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync + 'static {
    async fn resolve(&self, token: &str) -> Result<UserId, AuthError>;
}

/// Cloneable handle to the configured [`IdentityResolver`], shared with
/// request extractors as a router extension.
#[derive(Clone)]
pub struct Authenticator(Arc<dyn IdentityResolver>);

impl Authenticator {
    pub fn new(resolver: impl IdentityResolver) -> Self {
        Self(Arc::new(resolver))
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?
            .to_str()
            .map_err(|_| AuthError::InvalidHeader)?;

        let token = bearer_token(value).ok_or(AuthError::InvalidHeader)?;

        self.0.resolve(token).await.inspect_err(|e| {
            tracing::warn!("bearer token rejected: {e}");
        })
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}


#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use uuid::uuid;

    use super::{testing::*, *};

    const USER: UserId = uuid!("018f6146-32f4-7948-8289-cfb5cdb2b2af");

    fn authenticator() -> Authenticator {
        Authenticator::new(JwtIdentityResolver::new(TEST_SECRET, None))
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_bearer_scheme() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[tokio::test]
    async fn resolves_user_from_header() {
        let user = authenticator()
            .authenticate(&headers(&format!("Bearer {}", token_for(USER))))
            .await;

        assert_eq!(user, Ok(USER));
    }

    #[tokio::test]
    async fn rejects_missing_and_malformed_headers() {
        let auth = authenticator();

        assert_eq!(auth.authenticate(&HeaderMap::new()).await, Err(AuthError::MissingCredentials));
        assert_eq!(auth.authenticate(&headers("Token abc")).await, Err(AuthError::InvalidHeader));
        assert_eq!(auth.authenticate(&headers("Bearer abc")).await, Err(AuthError::InvalidToken));
    }
}
