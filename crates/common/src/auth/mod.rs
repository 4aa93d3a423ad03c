//! Authentication and authorization utilities
//!
//! Provides:
//! - Argon2 password hashing
//! - Signed session tokens carried in a cookie
//! - The request-scoped moderator context (`Actor`)

use crate::config::AuthConfig;
use crate::db::models::Moderator;
use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Moderator performing a request.
///
/// Passed explicitly into every core mutation so authorization does not
/// depend on ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub moderator_id: i32,
    pub username: String,
    pub display_name: String,
    pub can_manage_categories: bool,
    pub is_super_moderator: bool,
}

impl Actor {
    /// Check the category management capability
    pub fn require_category_manager(&self) -> Result<()> {
        if self.can_manage_categories {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "Managing categories requires the category management permission"
                    .to_string(),
            })
        }
    }
}

impl From<&Moderator> for Actor {
    fn from(moderator: &Moderator) -> Self {
        Self {
            moderator_id: moderator.id,
            username: moderator.username.clone(),
            display_name: moderator.full_name(),
            can_manage_categories: moderator.can_manage_categories,
            is_super_moderator: moderator.is_super_moderator,
        }
    }
}

/// Hash a password into a salted PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Verify a password against a stored PHC string.
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Moderator id
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl SessionClaims {
    pub fn moderator_id(&self) -> Result<i32> {
        self.sub.parse().map_err(|_| AppError::Unauthorized {
            message: "Session is invalid".to_string(),
        })
    }
}

/// Issues and validates moderator session tokens
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
    cookie_name: String,
    secure: bool,
}

impl SessionManager {
    /// Create a session manager with the given secret
    pub fn new(secret: &[u8], config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs: config.session_ttl_secs as i64,
            cookie_name: config.cookie_name.clone(),
            secure: config.secure_cookies,
        }
    }

    /// Build from configuration; a missing secret is replaced by a random
    /// per-process one, so sessions do not survive restarts.
    pub fn from_config(config: &AuthConfig) -> Self {
        match config.session_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Self::new(secret.as_bytes(), config),
            _ => {
                warn!("auth.session_secret is not set; using a random secret for this process");
                let secret: [u8; 32] = rand::random();
                Self::new(&secret, config)
            }
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Issue a token for a moderator
    pub fn issue(&self, moderator_id: i32) -> Result<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: moderator_id.to_string(),
            exp: (now + Duration::seconds(self.ttl_secs)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to issue session token: {}", e),
        })
    }

    /// Validate a token and return the moderator id it was issued for
    pub fn validate(&self, token: &str) -> Result<i32> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthorized {
                    message: "Session has expired".to_string(),
                },
                _ => AppError::Unauthorized {
                    message: "Session is invalid".to_string(),
                },
            })?;

        claims.moderator_id()
    }

    /// `Set-Cookie` value carrying a fresh session token
    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie(token, self.ttl_secs)
    }

    /// `Set-Cookie` value that clears the session
    pub fn clear_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        let mut parts = vec![
            format!("{}={}", self.cookie_name, value),
            "Path=/".to_string(),
            "HttpOnly".to_string(),
            "SameSite=Lax".to_string(),
            format!("Max-Age={}", max_age),
        ];
        if self.secure {
            parts.push("Secure".to_string());
        }
        parts.join("; ")
    }

    /// Pull this manager's cookie out of a `Cookie` header value
    pub fn token_from_cookie_header<'a>(&self, header: &'a str) -> Option<&'a str> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }
}
