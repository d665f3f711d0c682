//! Validation helpers for names and payloads

use serde_json::Value;

use crate::error::{Error, Result};

/// Feed names are non-empty strings.
pub fn validate_feed_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidFeedName("must be non-empty".into()));
    }
    Ok(())
}

/// Action names are non-empty strings.
pub fn validate_action_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidActionName("must be non-empty".into()));
    }
    Ok(())
}

/// Payloads like action data and feed data must be JSON objects.
pub fn ensure_object(label: &'static str, value: &Value) -> Result<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(Error::NotAnObject(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names() {
        assert!(validate_feed_name("prices").is_ok());
        assert!(validate_feed_name("").is_err());
        assert!(validate_action_name("do-it").is_ok());
        assert!(validate_action_name("").is_err());
    }

    #[test]
    fn objects() {
        assert!(ensure_object("feed data", &json!({})).is_ok());
        assert!(ensure_object("feed data", &json!([1, 2])).is_err());
        assert!(ensure_object("feed data", &json!("x")).is_err());
        assert!(ensure_object("feed data", &json!(null)).is_err());
    }
}
