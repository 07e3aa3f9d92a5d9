//! API route modules.

pub mod auth;
pub mod equipment;
pub mod files;
pub mod gallery;
pub mod health;
pub mod moderation;
pub mod notifications;
pub mod tasks;
pub mod telegram;
pub mod templates;
pub mod users;

use prhub_common::error::{HubError, HubResult};
use prhub_common::pagination::PageParams;
use serde::de::DeserializeOwned;

/// `(offset, limit)` for a list query, bounded by `limits.max_page_size`.
pub(crate) fn page_window(params: &PageParams) -> (i64, i64) {
    let max = prhub_common::config::get().limits.max_page_size;
    (params.offset(), params.limit(max))
}

/// Decode an optional JSON body; an empty body yields the default value.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> HubResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| HubError::validation(format!("Invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prhub_common::models::ReviewRequest;

    #[test]
    fn empty_body_is_default() {
        let req: ReviewRequest = optional_json(b"").unwrap();
        assert!(req.comment.is_none());
        let req: ReviewRequest = optional_json(b" \n").unwrap();
        assert!(req.comment.is_none());
    }

    #[test]
    fn body_is_parsed_when_present() {
        let req: ReviewRequest = optional_json(br#"{"comment":"ok"}"#).unwrap();
        assert_eq!(req.comment.as_deref(), Some("ok"));
        assert!(optional_json::<ReviewRequest>(b"{not json").is_err());
    }

    #[test]
    fn page_window_is_bounded() {
        crate::test_support::config();
        assert_eq!(page_window(&PageParams::new(5, 10_000)), (5, 100));
        assert_eq!(page_window(&PageParams::default()).0, 0);
    }
}
