//! HS256 token mint for hub auth tests.

use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize)]
struct Claims {
    exp: u64,
    sub: &'static str,
}

/// Mint a token valid for `ttl_secs` from now.
pub fn mint_jwt(secret: &str, ttl_secs: u64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs();
    encode(
        &Header::default(),
        &Claims {
            exp: now + ttl_secs,
            sub: "agent-ui",
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("jwt encode")
}
