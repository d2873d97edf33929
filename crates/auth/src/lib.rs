use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::HeaderMap;
use http::header;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

pub mod password;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub is_admin: bool,
}

impl Principal {
    pub fn new(username: impl Into<String>, is_admin: bool) -> Self {
        Self {
            username: username.into(),
            is_admin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub clock_skew: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AuthError {}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    username: String,
    #[serde(default)]
    is_admin: bool,
    iat: u64,
    exp: u64,
}

#[derive(Clone)]
pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    clock_skew: Duration,
}

impl TokenAuthenticator {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        if config.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(AuthError {
                code: "ERR_INVALID_CONFIG",
                message: format!("jwt secret must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        if config.token_ttl.is_zero() {
            return Err(AuthError {
                code: "ERR_INVALID_CONFIG",
                message: "token ttl must be non-zero".to_string(),
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: config.token_ttl,
            clock_skew: config.clock_skew,
        })
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, AuthError> {
        let iat = unix_now_secs();
        let claims = Claims {
            username: principal.username.clone(),
            is_admin: principal.is_admin,
            iat,
            exp: iat.saturating_add(self.token_ttl.as_secs()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|_| {
            AuthError {
                code: "ERR_INTERNAL",
                message: "failed to sign token".to_string(),
            }
        })
    }

    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.clock_skew.as_secs();
        validation.set_required_spec_claims(&["exp"]);

        let decoded = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|_| {
            AuthError {
                code: "ERR_AUTH_INVALID",
                message: "JWT validation failed".to_string(),
            }
        })?;

        let username = decoded.claims.username.trim();
        if username.is_empty() {
            return Err(AuthError {
                code: "ERR_AUTH_INVALID",
                message: "token has an empty username".to_string(),
            });
        }

        Ok(Principal {
            username: username.to_string(),
            is_admin: decoded.claims.is_admin,
        })
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = match bearer_token(headers) {
            Ok(token) => token,
            Err(err) => {
                if err.code != "ERR_AUTH_REQUIRED" {
                    tracing::debug!(code = err.code, "ignoring malformed authorization header");
                }
                return None;
            }
        };

        match self.verify(&token) {
            Ok(principal) => Some(principal),
            Err(err) => {
                tracing::debug!(code = err.code, "ignoring unverifiable bearer token");
                None
            }
        }
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let authz = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError {
            code: "ERR_AUTH_REQUIRED",
            message: "missing Authorization header".to_string(),
        })?;

    let token = authz
        .strip_prefix("Bearer ")
        .or_else(|| authz.strip_prefix("bearer "))
        .ok_or_else(|| AuthError {
            code: "ERR_AUTH_INVALID",
            message: "Authorization must be a Bearer token".to_string(),
        })?;

    if token.trim().is_empty() {
        return Err(AuthError {
            code: "ERR_AUTH_INVALID",
            message: "Bearer token is empty".to_string(),
        });
    }

    Ok(token.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn authenticator() -> TokenAuthenticator {
        TokenAuthenticator::new(AuthConfig {
            jwt_secret: SECRET.to_string(),
            token_ttl: Duration::from_secs(3600),
            clock_skew: Duration::ZERO,
        })
        .unwrap()
    }

    #[test]
    fn bearer_token_rejects_missing_header() {
        let headers = HeaderMap::new();
        let err = bearer_token(&headers).unwrap_err();
        assert_eq!(err.code, "ERR_AUTH_REQUIRED");
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dTE6cHc=".parse().unwrap());
        let err = bearer_token(&headers).unwrap_err();
        assert_eq!(err.code, "ERR_AUTH_INVALID");
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = TokenAuthenticator::new(AuthConfig {
            jwt_secret: "short".to_string(),
            token_ttl: Duration::from_secs(60),
            clock_skew: Duration::ZERO,
        })
        .err()
        .unwrap();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn issued_token_verifies_to_same_principal() {
        let auth = authenticator();
        let principal = Principal::new("u1", true);
        let token = auth.issue(&principal).unwrap();
        assert_eq!(auth.verify(&token).unwrap(), principal);
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            username: "u1".to_string(),
            is_admin: false,
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = authenticator().verify(&token).unwrap_err();
        assert_eq!(err.code, "ERR_AUTH_INVALID");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = TokenAuthenticator::new(AuthConfig {
            jwt_secret: "ffffffffffffffffffffffffffffffff".to_string(),
            token_ttl: Duration::from_secs(60),
            clock_skew: Duration::ZERO,
        })
        .unwrap();
        let token = other.issue(&Principal::new("u1", true)).unwrap();
        assert!(authenticator().verify(&token).is_err());
    }
}
