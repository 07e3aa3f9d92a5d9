//! Session token claims.
//!
//! Every login flow (password, Telegram widget, QR) ends in the same HS256
//! access/refresh pair. Issuing lives in prhub-api; decoding is here so the
//! token kind check cannot be forgotten by a caller.

use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Member id
    pub sub: Uuid,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "token_type")]
    pub kind: TokenKind,
}

/// Decode `token` and require it to be of kind `expected`.
///
/// Expired signatures map to `TokenExpired`; any other failure, including a
/// refresh token presented as an access token, is `InvalidToken`.
pub fn decode_claims(token: &str, secret: &str, expected: TokenKind) -> Result<Claims, HubError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => HubError::TokenExpired,
        _ => HubError::InvalidToken,
    })?;

    if data.claims.kind != expected {
        return Err(HubError::InvalidToken);
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "claims-test-secret";

    fn token(kind: TokenKind, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::nil(),
            username: "anna".into(),
            iat: now,
            exp: now + exp_offset,
            kind,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn kind_must_match() {
        let access = token(TokenKind::Access, 600);
        assert_eq!(decode_claims(&access, SECRET, TokenKind::Access).unwrap().username, "anna");
        assert!(matches!(
            decode_claims(&access, SECRET, TokenKind::Refresh),
            Err(HubError::InvalidToken)
        ));
    }

    #[test]
    fn expiry_and_bad_signature_are_distinguished() {
        let expired = token(TokenKind::Access, -3600);
        assert!(matches!(
            decode_claims(&expired, SECRET, TokenKind::Access),
            Err(HubError::TokenExpired)
        ));

        let fresh = token(TokenKind::Access, 600);
        assert!(matches!(
            decode_claims(&fresh, "other-secret", TokenKind::Access),
            Err(HubError::InvalidToken)
        ));
        assert!(matches!(
            decode_claims("garbage", SECRET, TokenKind::Access),
            Err(HubError::InvalidToken)
        ));
    }

    #[test]
    fn kind_serializes_as_token_type() {
        let json = serde_json::to_value(TokenKind::Refresh).unwrap();
        assert_eq!(json, "refresh");
    }
}
