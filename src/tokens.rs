//! Token issuance, refresh and verification.
//!
//! Tokens are HS256 JWTs signed with the configured secret. An access token
//! authenticates requests; a refresh token only buys new access tokens.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use ::jwt::{SignWithKey, VerifyWithKey};
use rocket::serde::json::{Error as JsonError, Json};
use rocket::State;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::db::DbConnection;
use crate::types::{body, ApiError, ApiResult, ValidationError};
use crate::users::models::User;

const INVALID_TOKEN: &str = "Token is invalid or expired";
const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub user_id: i32,
}

impl Claims {
    pub fn new(token_type: TokenType, user_id: i32, lifetime: Duration) -> Result<Self, ApiError> {
        let now = Utc::now();
        let expires = now.checked_add_signed(lifetime).ok_or(ApiError::Internal)?;
        Ok(Claims {
            token_type,
            exp: expires.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            user_id,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|_| ApiError::Internal)
}

pub fn encode(claims: &Claims, secret: &str) -> Result<String, ApiError> {
    let key = signing_key(secret)?;
    claims.sign_with_key(&key).map_err(|_| ApiError::Internal)
}

/// Decodes and checks signature and expiry. `expected` narrows the accepted
/// token type; `None` accepts either.
pub fn decode(token: &str, secret: &str, expected: Option<TokenType>) -> Result<Claims, ApiError> {
    let key = signing_key(secret)?;
    let claims: Claims = token.verify_with_key(&key).map_err(|e| {
        debug!(error = %e, "rejected token");
        ApiError::InvalidToken(INVALID_TOKEN.into())
    })?;
    if claims.is_expired() {
        return Err(ApiError::InvalidToken(INVALID_TOKEN.into()));
    }
    match expected {
        Some(token_type) if token_type != claims.token_type => {
            Err(ApiError::InvalidToken("Token has wrong type".into()))
        }
        _ => Ok(claims),
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

impl TokenPair {
    pub fn issue(user: &User, config: &Config) -> Result<TokenPair, ApiError> {
        let refresh = Claims::new(TokenType::Refresh, user.id, config.refresh_token_lifetime)?;
        let access = Claims::new(TokenType::Access, user.id, config.access_token_lifetime)?;
        Ok(TokenPair {
            refresh: encode(&refresh, &config.secret_key)?,
            access: encode(&access, &config.secret_key)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Refresh {
    refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Verify {
    token: Option<String>,
}

fn required(value: Option<String>, field: &str, errors: &mut ValidationError) -> String {
    match value {
        Some(value) if !value.is_empty() => value,
        Some(_) => {
            errors.add_error(field, "This field may not be blank.");
            String::new()
        }
        None => {
            errors.merge(ValidationError::required(field));
            String::new()
        }
    }
}

#[post("/create", data = "<credentials>")]
pub fn create(
    mut connection: DbConnection,
    config: &State<Config>,
    credentials: Result<Json<Credentials>, JsonError<'_>>,
) -> ApiResult<TokenPair> {
    let credentials = body(credentials)?;
    let mut errors = ValidationError::default();
    let username = required(credentials.username, "username", &mut errors);
    let password = required(credentials.password, "password", &mut errors);
    errors.into_result()?;

    let user = User::find_by_name(&username, &mut connection)?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::AuthenticationFailed(NO_ACTIVE_ACCOUNT.into()))?;
    if !user.verify_password(&password)? {
        info!(username = %username, "rejected login");
        return Err(ApiError::AuthenticationFailed(NO_ACTIVE_ACCOUNT.into()));
    }

    Ok(Json(TokenPair::issue(&user, config)?))
}

#[post("/refresh", data = "<refresh>")]
pub fn refresh(
    config: &State<Config>,
    refresh: Result<Json<Refresh>, JsonError<'_>>,
) -> ApiResult<Value> {
    let refresh = body(refresh)?;
    let mut errors = ValidationError::default();
    let token = required(refresh.refresh, "refresh", &mut errors);
    errors.into_result()?;

    let claims = decode(&token, &config.secret_key, Some(TokenType::Refresh))?;
    let access = Claims::new(TokenType::Access, claims.user_id, config.access_token_lifetime)?;
    let access = encode(&access, &config.secret_key)?;
    Ok(Json(json!({ "access": access })))
}

#[post("/verify", data = "<verify>")]
pub fn verify(
    config: &State<Config>,
    verify: Result<Json<Verify>, JsonError<'_>>,
) -> ApiResult<Value> {
    let verify = body(verify)?;
    let mut errors = ValidationError::default();
    let token = required(verify.token, "token", &mut errors);
    errors.into_result()?;

    decode(&token, &config.secret_key, None)?;
    Ok(Json(json!({})))
}
