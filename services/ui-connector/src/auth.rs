//! Bearer-token validation for agent UI connections.
//!
//! Tokens are minted by an external registration service; this side only
//! verifies the HS256 signature and expiry.  All other claims are opaque.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[allow(dead_code)]
    exp: u64,
}

pub fn check_jwt(token: &str, secret: &str) -> Result<(), AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        exp: u64,
        sub: &'static str,
    }

    fn mint(secret: &str, exp: u64) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                exp,
                sub: "agent-1",
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600
    }

    #[test]
    fn valid_token_passes() {
        let token = mint("secret-1", future_exp());
        assert!(check_jwt(&token, "secret-1").is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("secret-1", future_exp());
        assert!(check_jwt(&token, "secret-2").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint("secret-1", 1_000);
        assert!(check_jwt(&token, "secret-1").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(check_jwt("not-a-jwt", "secret-1").is_err());
    }
}
