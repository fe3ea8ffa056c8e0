use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use super::{AuthError, IdentityResolver, UserId};

type HmacSha256 = Hmac<Sha256>;

/// Verifies HS256-signed JWTs issued by the identity provider with a shared
/// secret. The caller id is the `sub` claim.
pub struct JwtIdentityResolver {
    secret: Vec<u8>,
    audience: Option<String>,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Self::One(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

#[derive(Deserialize)]
struct Claims {
    sub: Option<String>,
    exp: i64,
    aud: Option<Audience>,
}

impl JwtIdentityResolver {
    pub fn new(secret: impl Into<String>, audience: Option<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
            audience,
        }
    }

    fn verify(&self, token: &str, now: i64) -> Result<UserId, AuthError> {
        let mut parts = token.split('.');
        let (Some(encoded_header), Some(encoded_claims), Some(encoded_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidToken);
        };

        let header: Header = decode_segment(encoded_header)?;
        if header.alg != "HS256" {
            return Err(AuthError::InvalidToken);
        }

        let signing_input = &token[..encoded_header.len() + 1 + encoded_claims.len()];
        let signature = URL_SAFE_NO_PAD
            .decode(encoded_signature)
            .map_err(|_| AuthError::InvalidToken)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidToken)?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AuthError::InvalidToken)?;

        let claims: Claims = decode_segment(encoded_claims)?;
        if now >= claims.exp {
            return Err(AuthError::Expired);
        }
        if let Some(expected) = &self.audience {
            if !claims.aud.is_some_and(|aud| aud.contains(expected)) {
                return Err(AuthError::InvalidToken);
            }
        }

        let sub = claims.sub.ok_or(AuthError::InvalidToken)?;
        Uuid::parse_str(&sub).map_err(|_| AuthError::InvalidToken)
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<UserId, AuthError> {
        self.verify(token, chrono::Utc::now().timestamp())
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::uuid;

    use super::*;
    use crate::auth::testing::{sign_claims, TEST_SECRET};

    const USER: UserId = uuid!("018f6146-32f4-7948-8289-cfb5cdb2b2af");
    const NOW: i64 = 1_700_000_000;

    fn resolver(audience: Option<&str>) -> JwtIdentityResolver {
        JwtIdentityResolver::new(TEST_SECRET, audience.map(String::from))
    }

    #[test]
    fn accepts_valid_token() {
        let token = sign_claims(TEST_SECRET, &json!({ "sub": USER.to_string(), "exp": NOW + 60 }));

        assert_eq!(resolver(None).verify(&token, NOW), Ok(USER));
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign_claims(TEST_SECRET, &json!({ "sub": USER.to_string(), "exp": NOW }));

        assert_eq!(resolver(None).verify(&token, NOW), Err(AuthError::Expired));
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = sign_claims("another-secret", &json!({ "sub": USER.to_string(), "exp": NOW + 60 }));

        assert_eq!(resolver(None).verify(&token, NOW), Err(AuthError::InvalidToken));
    }

    #[test]
    fn rejects_tampered_payload() {
        let token = sign_claims(TEST_SECRET, &json!({ "sub": USER.to_string(), "exp": NOW + 60 }));
        let forged = URL_SAFE_NO_PAD.encode(json!({ "sub": Uuid::nil().to_string(), "exp": NOW + 60 }).to_string());
        let parts = token.split('.').collect::<Vec<_>>();
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        assert_eq!(resolver(None).verify(&tampered, NOW), Err(AuthError::InvalidToken));
    }

    #[test]
    fn checks_audience_when_configured() {
        let token = sign_claims(
            TEST_SECRET,
            &json!({ "sub": USER.to_string(), "exp": NOW + 60, "aud": ["authenticated", "other"] }),
        );
        let no_aud = sign_claims(TEST_SECRET, &json!({ "sub": USER.to_string(), "exp": NOW + 60 }));

        assert_eq!(resolver(Some("authenticated")).verify(&token, NOW), Ok(USER));
        assert_eq!(resolver(Some("admin")).verify(&token, NOW), Err(AuthError::InvalidToken));
        assert_eq!(resolver(Some("authenticated")).verify(&no_aud, NOW), Err(AuthError::InvalidToken));
    }

    #[test]
    fn requires_uuid_subject() {
        let missing = sign_claims(TEST_SECRET, &json!({ "exp": NOW + 60 }));
        let not_uuid = sign_claims(TEST_SECRET, &json!({ "sub": "alice", "exp": NOW + 60 }));

        assert_eq!(resolver(None).verify(&missing, NOW), Err(AuthError::InvalidToken));
        assert_eq!(resolver(None).verify(&not_uuid, NOW), Err(AuthError::InvalidToken));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in ["", "a.b", "a.b.c.d", "not.a.jwt"] {
            assert_eq!(resolver(None).verify(token, NOW), Err(AuthError::InvalidToken));
        }
    }
}
