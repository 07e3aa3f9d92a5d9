//! Telegram Login Widget verification.
//!
//! The widget signs its fields with HMAC-SHA256 keyed by `SHA256(bot_token)`
//! over the data-check-string: every field except `hash`, as `key=value`,
//! sorted by key and joined with `\n`.

use hmac::{Hmac, Mac};
use prhub_common::models::TelegramAuthData;
use sha2::{Digest, Sha256};

use crate::error::TelegramError;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew for `auth_date` values from the future.
const MAX_FUTURE_SKEW_SECS: i64 = 60;

/// Build the data-check-string for a payload.
pub fn data_check_string(data: &TelegramAuthData) -> String {
    let mut fields: Vec<(&str, String)> = vec![
        ("auth_date", data.auth_date.to_string()),
        ("id", data.id.to_string()),
    ];
    let optional = [
        ("first_name", &data.first_name),
        ("last_name", &data.last_name),
        ("photo_url", &data.photo_url),
        ("username", &data.username),
    ];
    fields.extend(
        optional
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v.clone()))),
    );
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verify a login payload against the bot token as of `now` (unix seconds).
pub fn verify_login_at(
    data: &TelegramAuthData,
    bot_token: &str,
    max_age_secs: u64,
    now: i64,
) -> Result<(), TelegramError> {
    let expected = hex::decode(&data.hash).map_err(|_| TelegramError::InvalidSignature)?;

    let secret = Sha256::digest(bot_token.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&secret).map_err(|_| TelegramError::InvalidSignature)?;
    mac.update(data_check_string(data).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| TelegramError::InvalidSignature)?;

    let age = now - data.auth_date;
    if age > i64::try_from(max_age_secs).unwrap_or(i64::MAX) || age < -MAX_FUTURE_SKEW_SECS {
        return Err(TelegramError::Stale);
    }

    Ok(())
}

/// Verify a login payload against the bot token using the current time.
pub fn verify_login(data: &TelegramAuthData, bot_token: &str, max_age_secs: u64) -> Result<(), TelegramError> {
    verify_login_at(data, bot_token, max_age_secs, chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456:TEST-token";
    const NOW: i64 = 1_760_000_000;

    fn signed(mut data: TelegramAuthData) -> TelegramAuthData {
        let secret = Sha256::digest(TOKEN.as_bytes());
        let mut mac = HmacSha256::new_from_slice(&secret).unwrap();
        mac.update(data_check_string(&data).as_bytes());
        data.hash = hex::encode(mac.finalize().into_bytes());
        data
    }

    fn payload() -> TelegramAuthData {
        TelegramAuthData {
            id: 42,
            first_name: Some("Anna".into()),
            last_name: None,
            username: Some("anna_pr".into()),
            photo_url: None,
            auth_date: NOW - 10,
            hash: String::new(),
        }
    }

    #[test]
    fn check_string_is_sorted_and_skips_missing_fields() {
        assert_eq!(
            data_check_string(&payload()),
            format!("auth_date={}\nfirst_name=Anna\nid=42\nusername=anna_pr", NOW - 10)
        );
    }

    #[test]
    fn accepts_correct_signature() {
        assert!(verify_login_at(&signed(payload()), TOKEN, 86_400, NOW).is_ok());
    }

    #[test]
    fn rejects_tampered_fields() {
        let mut data = signed(payload());
        data.id = 43;
        assert!(matches!(
            verify_login_at(&data, TOKEN, 86_400, NOW),
            Err(TelegramError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_other_bot_token() {
        let data = signed(payload());
        assert!(verify_login_at(&data, "999:other", 86_400, NOW).is_err());
    }

    #[test]
    fn rejects_garbage_hash() {
        let mut data = payload();
        data.hash = "zz-not-hex".into();
        assert!(matches!(
            verify_login_at(&data, TOKEN, 86_400, NOW),
            Err(TelegramError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_stale_payload() {
        let mut data = payload();
        data.auth_date = NOW - 7200;
        let data = signed(data);
        assert!(matches!(
            verify_login_at(&data, TOKEN, 3600, NOW),
            Err(TelegramError::Stale)
        ));
    }
}
