use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey,
                   Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims { pub sub: String, pub exp: i64 }

/// Signs a sender session token. Presenting it on a later join makes the
/// re-join idempotent; cast/leave require it.
pub fn issue(sender_id: &str, secret: &str) -> String {
    let c = Claims { sub: sender_id.into(), exp: Utc::now().timestamp() + 86_400 };
    encode(&Header::default(), &c, &EncodingKey::from_secret(secret.as_bytes()))
        .unwrap()
}

pub fn sender_id(token: &str, secret: &str) -> Option<String> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()),
                     &Validation::new(Algorithm::HS256))
        .map(|d| d.claims.sub).ok()
}
