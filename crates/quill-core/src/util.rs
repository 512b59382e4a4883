//! Input cleanup shared by configuration and the HTTP clients.

use std::fmt;

use reqwest::StatusCode;

const ERROR_EXCERPT_CHARS: usize = 180;

/// Trimmed text, or `None` when absent or blank
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Why a configured endpoint was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointError {
    Blank,
    MissingScheme,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => f.write_str("must not be empty"),
            Self::MissingScheme => f.write_str("must include http:// or https://"),
        }
    }
}

/// Trim `raw` and require an http(s) scheme.
///
/// Trailing slashes are dropped so callers can append path segments.
pub fn parse_endpoint(raw: &str) -> Result<String, EndpointError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EndpointError::Blank);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(EndpointError::MissingScheme);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// One-line description of a failed HTTP call: the service's own `message`
/// when it sent one, otherwise a short excerpt of the raw body.
pub fn describe_http_failure(status: StatusCode, message: Option<String>, body: &str) -> String {
    let code = status.as_u16();
    if let Some(message) = non_blank(message) {
        return format!("{message} ({code})");
    }

    let excerpt = body.trim().chars().take(ERROR_EXCERPT_CHARS).collect::<String>();
    if excerpt.is_empty() {
        format!("HTTP {code}")
    } else {
        format!("{excerpt} ({code})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn non_blank_trims_and_drops_empty_values() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" \t".to_string())), None);
        assert_eq!(non_blank(Some(" demo ".to_string())), Some("demo".to_string()));
    }

    #[test]
    fn parse_endpoint_requires_scheme_and_drops_trailing_slash() {
        assert_eq!(
            parse_endpoint(" http://localhost:8080/v1/ "),
            Ok("http://localhost:8080/v1".to_string())
        );
        assert_eq!(parse_endpoint("  "), Err(EndpointError::Blank));
        assert_eq!(
            parse_endpoint("ftp://example.com"),
            Err(EndpointError::MissingScheme)
        );
        assert_eq!(
            parse_endpoint("firestore.local"),
            Err(EndpointError::MissingScheme)
        );
    }

    #[test]
    fn describe_http_failure_prefers_service_message() {
        assert_eq!(
            describe_http_failure(StatusCode::FORBIDDEN, Some(" DENIED ".into()), "{}"),
            "DENIED (403)"
        );
        assert_eq!(
            describe_http_failure(StatusCode::BAD_GATEWAY, None, "upstream down"),
            "upstream down (502)"
        );
        assert_eq!(
            describe_http_failure(StatusCode::BAD_GATEWAY, None, "  "),
            "HTTP 502"
        );
    }

    #[test]
    fn describe_http_failure_truncates_long_bodies() {
        let body = "x".repeat(500);
        let described = describe_http_failure(StatusCode::INTERNAL_SERVER_ERROR, None, &body);
        assert_eq!(described, format!("{} (500)", "x".repeat(ERROR_EXCERPT_CHARS)));
    }
}
