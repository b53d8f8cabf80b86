use anyhow::{Context, Result};
use chrono::Utc;
use contracts::system::auth::TokenClaims;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

/// Generate JWT access token
pub fn generate_access_token(
    secret: &str,
    lifetime_hours: i64,
    user_id: &str,
    username: &str,
) -> Result<String> {
    let now = Utc::now();
    let exp = (now + chrono::Duration::hours(lifetime_hours)).timestamp() as usize;
    let iat = now.timestamp() as usize;

    let claims = TokenClaims {
        sub: user_id.to_string(),
        username: username.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        exp,
        iat,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to encode JWT token")?;

    Ok(token)
}

/// Допуск по `exp` при проверке токена, секунды
pub const EXP_LEEWAY_SECS: u64 = 60;

/// Validate JWT token and extract claims
pub fn validate_token(secret: &str, token: &str) -> Result<TokenClaims> {
    let mut validation = Validation::default();
    validation.leeway = EXP_LEEWAY_SECS;
    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .context("Failed to decode JWT token")?;

    Ok(token_data.claims)
}

/// Generate a cryptographically secure JWT secret (256 bits)
pub fn generate_jwt_secret() -> String {
    use base64::{engine::general_purpose, Engine as _};
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen::<u8>()).collect();
    general_purpose::STANDARD.encode(&random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip_keeps_subject() {
        let secret = generate_jwt_secret();
        let token = generate_access_token(&secret, 1, "user-1", "alice").unwrap();
        let claims = validate_token(&secret, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = generate_access_token("secret-a", 1, "user-1", "alice").unwrap();
        assert!(validate_token("secret-b", &token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = generate_access_token("secret", -2, "user-1", "alice").unwrap();
        assert!(validate_token("secret", &token).is_err());
    }
}
