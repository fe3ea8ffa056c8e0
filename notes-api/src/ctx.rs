use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};

use crate::{
    auth::{Authenticator, UserId},
    Error, DB,
};

/// Everything a notes handler needs: the authenticated caller and the store
/// handle injected by the router.
#[derive(Clone, FromRequestParts)]
pub struct BaseParams {
    pub ctx: Ctx,
    #[from_request(via(Extension))]
    pub db: DB,
}

impl BaseParams {
    pub fn new(db: DB, ctx: Ctx) -> Self {
        Self { db, ctx }
    }
}

/// Authenticated request context. Extraction fails with `401` before any
/// handler runs when the bearer credential is missing or invalid.
#[derive(Clone, Debug)]
pub struct Ctx {
    user_id: UserId,
}

impl Ctx {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = parts
            .extensions
            .get::<Authenticator>()
            .cloned()
            .ok_or_else(|| Error::Unexpected("authenticator is not configured".into()))?;

        let user_id = authenticator.authenticate(&parts.headers).await?;

        Ok(Self { user_id })
    }
}
