use actix_web::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::model::auth::Claims;

pub const REFRESH_ROLE: &str = "refresh";

#[derive(Clone)]
pub struct JwtUtils {
    secret: String,
}

#[derive(Debug)]
pub enum TokenVerifyResult {
    Valid(Claims),
    Expired,
    Invalid,
}

impl JwtUtils {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn generate_token(&self, user_id: &str, role: &str) -> Result<String, JwtError> {
        self.sign(user_id, role, Duration::hours(1))
    }

    pub fn generate_refresh_token(&self, user_id: &str) -> Result<String, JwtError> {
        self.sign(user_id, REFRESH_ROLE, Duration::days(30))
    }

    fn sign(&self, user_id: &str, role: &str, ttl: Duration) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    pub fn verify_token(&self, token: &str) -> TokenVerifyResult {
        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => TokenVerifyResult::Valid(data.claims),
            Err(err) => match *err.kind() {
                ErrorKind::ExpiredSignature => TokenVerifyResult::Expired,
                _ => TokenVerifyResult::Invalid,
            },
        }
    }
}

pub fn build_access_token_cookie(token: &str) -> Cookie<'_> {
    Cookie::build("accessToken", token.to_string())
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(1))
        .finish()
}

pub fn build_refresh_token_cookie(token: &str) -> Cookie<'_> {
    Cookie::build("refreshToken", token.to_string())
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .finish()
}
