use axum::Json;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::result::ApiResponse;

pub mod university;

pub use university::{UniversityInfo, extract_university_info};

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub exp: i64,
    pub iat: i64,
}

/// Issues a bearer token for `username`. Returns the token and its expiry as a unix timestamp.
pub fn generate_token(
    username: &str,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + Duration::seconds(config.jwt_expiration().as_secs() as i64)).timestamp();

    let claims = Claims {
        sub: username.to_string(),
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Single-use email verification token: two v4 UUIDs as 64 hex characters.
pub fn generate_verification_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Rejects `value` when it is longer than `max` characters, the width of the
/// column it is stored in.
pub fn ensure_max_chars(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const USERNAME_TAKEN: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const EMAIL_TAKEN: i32 = 1005;
    pub const INVALID_DOMAIN: i32 = 1006;
    pub const INVALID_TOKEN: i32 = 1007;
    pub const ALREADY_VERIFIED: i32 = 1008;
    pub const EMAIL_NOT_VERIFIED: i32 = 1009;
    pub const ACCOUNT_DEACTIVATED: i32 = 1010;
    pub const ALREADY_MEMBER: i32 = 1011;
    pub const DOMAIN_RESTRICTED: i32 = 1012;
    pub const ROOM_FULL: i32 = 1013;
    pub const NOT_A_MEMBER: i32 = 1014;
    pub const LAST_ADMIN: i32 = 1015;
    pub const MUTED: i32 = 1016;
    pub const QUIZ_CLOSED: i32 = 1017;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const STORAGE_ERROR: i32 = 5001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_limit_counts_characters_not_bytes() {
        assert!(ensure_max_chars("Subject", &"é".repeat(100), 100).is_ok());
        let err = ensure_max_chars("Subject", &"s".repeat(101), 100).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Subject must be at most 100 characters"));
    }

    #[test]
    fn token_round_trip_keeps_subject() {
        let config = Config::default();
        let (token, exp) = generate_token("asha", &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "asha");
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let config = Config::default();
        let (token, _) = generate_token("asha", &config).unwrap();

        let other = Config {
            jwt_secret: "another-secret".to_string(),
            ..Config::default()
        };
        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = Config {
            jwt_expiration_secs: 0,
            ..Config::default()
        };
        let claims = Claims {
            sub: "asha".to_string(),
            exp: Utc::now().timestamp() - 3600,
            iat: Utc::now().timestamp() - 7200,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn verification_tokens_are_unique_and_url_safe() {
        let a = generate_verification_token();
        let b = generate_verification_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password("correct horse", 4).unwrap();
        assert!(verify_password("correct horse", &hashed).unwrap());
        assert!(!verify_password("battery staple", &hashed).unwrap());
    }
}
