//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes.

use chrono::NaiveDate;
use validator::Validate;

use crate::error::HubError;

/// Validate a request body, returning a HubError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), HubError> {
    body.validate().map_err(|e| HubError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut messages = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>();
    messages.sort();
    messages.join("; ")
}

/// Reject names that are empty or whitespace only.
pub fn validate_name(name: &str, what: &str) -> Result<(), HubError> {
    if name.trim().is_empty() {
        return Err(HubError::Validation {
            message: format!("{what} cannot be empty or whitespace only"),
        });
    }
    Ok(())
}

/// An inclusive date range is valid when it does not end before it starts.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), HubError> {
    if end < start {
        return Err(HubError::Validation {
            message: format!("End date {end} is before start date {start}"),
        });
    }
    Ok(())
}

/// Strip path separators and control characters from uploaded filenames.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0') && !c.is_control())
        .take(255)
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "title is required"))]
        title: String,
        #[validate(range(min = 1, max = 5, message = "rating must be 1-5"))]
        rating: i16,
    }

    #[test]
    fn collects_all_messages() {
        let err = validate_request(&Sample {
            title: String::new(),
            rating: 9,
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: rating must be 1-5; title is required"
        );
    }

    #[test]
    fn whitespace_names_rejected() {
        assert!(validate_name("   ", "Name").is_err());
        assert!(validate_name("Canon R6", "Name").is_ok());
    }

    #[test]
    fn date_range_end_before_start_is_invalid() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert!(validate_date_range(d("2026-03-01"), d("2026-03-01")).is_ok());
        assert!(validate_date_range(d("2026-03-01"), d("2026-03-05")).is_ok());
        assert!(validate_date_range(d("2026-03-05"), d("2026-03-01")).is_err());
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("photo 1.JPG"), "photo 1.JPG");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }
}
