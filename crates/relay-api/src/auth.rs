//! Token handling. Tokens are minted by the identity provider in front of the
//! relay (the chat platform bridge) using the shared secret; the relay only
//! verifies them.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use relay_types::UserId;
use relay_types::api::Claims;
use relay_types::models::DisplayFields;

/// Lifetime of tokens minted by [`create_token`].
pub const TOKEN_TTL_DAYS: i64 = 30;

pub fn create_token(secret: &str, user_id: UserId, display: &DisplayFields) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: display.username.clone(),
        first_name: display.first_name.clone(),
        last_name: display.last_name.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip_keeps_identity() {
        let display = DisplayFields {
            username: Some("alice".into()),
            first_name: Some("Alice".into()),
            last_name: None,
        };
        let token = create_token("secret", 42, &display).unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.display_fields(), display);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("secret", 42, &DisplayFields::default()).unwrap();
        assert!(decode_token("other", &token).is_err());
    }
}
