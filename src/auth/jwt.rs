use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn create_token(
    user_id: Uuid,
    username: &str,
    secret: &str,
    expiry_hours: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = Duration::try_hours(expiry_hours)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::Internal(format!("Token lifetime out of range: {expiry_hours}h"))
        })?;
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token creation failed: {e}")))
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_carries_user_identity() {
        let id = Uuid::new_v4();
        let token = create_token(id, "alice", "secret", 1).unwrap();

        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = create_token(Uuid::new_v4(), "alice", "secret", 1).unwrap();
        assert!(matches!(
            validate_token(&token, "other"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = create_token(Uuid::new_v4(), "alice", "secret", -2).unwrap();
        assert!(matches!(
            validate_token(&token, "secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn out_of_range_lifetime_is_an_error() {
        let result = create_token(Uuid::new_v4(), "alice", "secret", i64::MAX);
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn garbage_is_unauthorized() {
        assert!(matches!(
            validate_token("not.a.jwt", "secret"),
            Err(AppError::Unauthorized)
        ));
    }
}
