use crate::entities::users::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // username
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

pub fn create_jwt(
    username: &str,
    role: Role,
    ttl: Duration,
    key: &EncodingKey,
    algorithm: Algorithm,
) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let expiration = (now + ttl).timestamp().max(0);

    let claims = Claims {
        sub: username.to_owned(),
        role,
        exp: expiration as usize,
        iat: now.timestamp().max(0) as usize,
    };

    encode(&Header::new(algorithm), &claims, key)
}

pub fn validate_jwt(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
) -> jsonwebtoken::errors::Result<Claims> {
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, key, &validation)?;

    Ok(token_data.claims)
}
