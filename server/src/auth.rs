//! HS256 bearer tokens. Tokens only identify the caller; roles are always
//! read back from the store.

use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use platform_authz::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    /// Storage code of the role at issue time. Informational only.
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue_token(
    user_id: Uuid,
    role: Role,
    config: &AuthConfig,
) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let exp = now
        .checked_add_signed(Duration::minutes(config.token_ttl_minutes))
        .unwrap_or(now)
        .timestamp() as usize;
    let claims = SessionClaims {
        sub: user_id,
        role: role.to_external().into(),
        exp,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &config.encoding_key())
}

pub fn decode_token(
    token: &str,
    config: &AuthConfig,
) -> jsonwebtoken::errors::Result<SessionClaims> {
    jsonwebtoken::decode::<SessionClaims>(token, &config.decoding_key(), &Validation::default())
        .map(|data| data.claims)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(ttl: i64) -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-test-secret-test-secret!".into(),
            token_ttl_minutes: ttl,
        }
    }

    #[test]
    fn tokens_round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, Role::Zonal, &config(30)).unwrap();
        let claims = decode_token(&token, &config(30)).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "ZONAL_MANAGER");
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = issue_token(Uuid::new_v4(), Role::Viewer, &config(-10)).unwrap();
        assert!(decode_token(&token, &config(30)).is_err());
    }

    #[test]
    fn foreign_signatures_are_rejected() {
        let token = issue_token(Uuid::new_v4(), Role::National, &config(30)).unwrap();
        let other = AuthConfig {
            jwt_secret: "another-secret-another-secret-00".into(),
            token_ttl_minutes: 30,
        };
        assert!(decode_token(&token, &other).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def"),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
