//! Fetch items, responses and outcomes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// A unit of work for the fetch engine.
///
/// `metadata` carries the domain context a classifier needs (token id, batch
/// offset, whether the marketplace already knows the token).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchItem {
    pub uri: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl FetchItem {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn meta_bool(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Classifier decision for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Done, result recorded
    Accept,
    /// Done, permanently failed or nothing to record
    Skip,
    /// Attempt the same item again after the delay
    RetryAfter(Duration),
}

impl FetchOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FetchOutcome::RetryAfter(_))
    }
}

/// What the classifier sees for one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    /// The server answered
    Http {
        status: u16,
        /// Header names are lowercase
        headers: BTreeMap<String, String>,
        body: String,
    },
    /// Timeout, connect or read failure
    NoResponse(String),
    /// The request could not be built
    NoRequest(String),
    /// The retry budget ran out before this attempt
    Expired,
}

/// Status reported for [`FetchResponse::Expired`]
pub const EXPIRED_STATUS: i32 = -1;

impl FetchResponse {
    /// Shorthand for an HTTP response without headers
    pub fn http(status: u16, body: &str) -> Self {
        FetchResponse::Http {
            status,
            headers: BTreeMap::new(),
            body: body.to_string(),
        }
    }

    /// Shorthand for a 200 response with a JSON body
    pub fn json(value: &Value) -> Self {
        Self::http(200, &value.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let FetchResponse::Http { headers, .. } = &mut self {
            headers.insert(name.to_lowercase(), value.to_string());
        }
        self
    }

    /// HTTP status, `-1` for an expired budget, `0` when no response arrived
    pub fn status(&self) -> i32 {
        match self {
            FetchResponse::Http { status, .. } => *status as i32,
            FetchResponse::Expired => EXPIRED_STATUS,
            _ => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResponse::Http { status, .. } if (200..300).contains(status))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            FetchResponse::Http { headers, .. } => headers.get(&name.to_lowercase()).map(String::as_str),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            FetchResponse::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Parse the body as JSON, if any
    pub fn body_json(&self) -> Option<Value> {
        self.body().and_then(|b| serde_json::from_str(b).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_metadata() {
        let item = FetchItem::new("https://example.com/1")
            .with_meta("token_id", "1")
            .with_meta("has_asset", true);
        assert_eq!(item.meta_str("token_id"), Some("1"));
        assert!(item.meta_bool("has_asset"));
        assert!(!item.meta_bool("missing"));
    }

    #[test]
    fn test_response_accessors() {
        let response = FetchResponse::http(429, "").with_header("Retry-After", "2");
        assert_eq!(response.status(), 429);
        assert_eq!(response.header("retry-after"), Some("2"));
        assert!(!response.is_success());

        assert_eq!(FetchResponse::Expired.status(), -1);
        assert_eq!(FetchResponse::NoResponse("timeout".into()).status(), 0);

        let ok = FetchResponse::json(&json!({"a": 1}));
        assert!(ok.is_success());
        assert_eq!(ok.body_json(), Some(json!({"a": 1})));
    }

    #[test]
    fn test_outcome_terminal() {
        assert!(FetchOutcome::Accept.is_terminal());
        assert!(FetchOutcome::Skip.is_terminal());
        assert!(!FetchOutcome::RetryAfter(Duration::from_secs(1)).is_terminal());
    }
}
