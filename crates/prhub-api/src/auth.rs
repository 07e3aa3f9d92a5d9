//! Authentication: Argon2 password hashes for staff accounts and HS256 JWT
//! pairs for every session, whichever way the member signed in.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use prhub_common::auth::{Claims, TokenKind};
use prhub_common::config::AuthConfig;
use prhub_common::error::{HubError, HubResult};
use prhub_common::models::User;
use serde::Serialize;
use uuid::Uuid;

/// Token pair returned by every login flow.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn generate_token(
    user_id: Uuid,
    username: &str,
    kind: TokenKind,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000);
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl)).timestamp(),
        kind,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Generate both access and refresh tokens.
pub fn generate_token_pair(
    user_id: Uuid,
    username: &str,
    secret: &str,
    access_ttl: u64,
    refresh_ttl: u64,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    Ok(TokenPair {
        access_token: generate_token(user_id, username, TokenKind::Access, secret, access_ttl)?,
        refresh_token: generate_token(user_id, username, TokenKind::Refresh, secret, refresh_ttl)?,
        expires_in: access_ttl,
        token_type: "Bearer".to_string(),
    })
}

/// Issue a session for `user` with the configured lifetimes.
pub fn issue_tokens(user: &User, cfg: &AuthConfig) -> HubResult<TokenPair> {
    generate_token_pair(
        user.id,
        &user.username,
        &cfg.jwt_secret,
        cfg.access_token_ttl_secs,
        cfg.refresh_token_ttl_secs,
    )
    .map_err(|e| HubError::Internal(anyhow::anyhow!("Token generation failed: {e}")))
}
