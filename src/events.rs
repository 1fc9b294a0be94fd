//! Request events from the host collaborator and URL decomposition.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One observed navigation/request, as delivered by the host event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    #[serde(default = "new_event_id")]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub ts: DateTime<Utc>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_hint: Option<String>,
}

fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

impl RequestEvent {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: new_event_id(),
            ts: Utc::now(),
            url: url.into(),
            request_body: None,
            domain_hint: None,
        }
    }

    pub fn with_body(url: impl Into<String>, body: Vec<u8>) -> Self {
        let mut ev = Self::new(url);
        ev.request_body = Some(body);
        ev
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// Scheme + hostname of a request URL. The hostname is the unit of risk
/// accumulation and blocking granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: Scheme,
    pub host: String,
}

/// Whether the URL uses a plain web scheme the engine processes at all.
pub fn is_web_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Decompose a web URL into scheme and lowercase hostname.
///
/// Strips any userinfo and port from the authority. Fails with a parse error
/// on non-web schemes or an empty host.
pub fn parse_url(url: &str) -> Result<ParsedUrl> {
    let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
        (Scheme::Https, rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (Scheme::Http, rest)
    } else {
        return Err(EngineError::parse(url, "unsupported scheme"));
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority
        .rsplit('@')
        .next()
        .unwrap_or(authority)
        .split(':')
        .next()
        .unwrap_or(authority);

    if host.is_empty() {
        return Err(EngineError::parse(url, "empty host"));
    }

    Ok(ParsedUrl {
        scheme,
        host: host.to_ascii_lowercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_https() {
        let p = parse_url("https://Example.COM/path?q=1").unwrap();
        assert_eq!(p.scheme, Scheme::Https);
        assert_eq!(p.host, "example.com");
    }

    #[test]
    fn parses_port_and_userinfo() {
        let p = parse_url("http://user:pw@tracker.evil.net:8080/beacon").unwrap();
        assert_eq!(p.scheme, Scheme::Http);
        assert_eq!(p.host, "tracker.evil.net");
    }

    #[test]
    fn rejects_non_web_scheme() {
        assert!(parse_url("chrome-extension://abcdef/popup.html").is_err());
        assert!(parse_url("ftp://mirror.example.org/file").is_err());
        assert!(!is_web_url("about:blank"));
    }

    #[test]
    fn rejects_empty_host() {
        assert!(parse_url("https:///path").is_err());
        assert!(parse_url("http://").is_err());
    }

    #[test]
    fn event_json_defaults_id_and_ts() {
        let ev: RequestEvent = serde_json::from_str(r#"{"url":"https://a.example"}"#).unwrap();
        assert!(!ev.id.is_empty());
        assert!(ev.request_body.is_none());
    }
}
