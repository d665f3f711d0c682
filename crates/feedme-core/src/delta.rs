//! Feed delta payloads
//!
//! Deltas describe incremental mutations to feed data and ride along with
//! ActionRevelation messages. The typed enum doubles as the structural
//! validator: a delta that deserializes is a valid delta.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One path step into feed data: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Key(String),
    Index(u64),
}

/// A single feed delta operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Operation")]
pub enum Delta {
    Set {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: Value,
    },
    Delete {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
    },
    DeleteValue {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: Value,
    },
    Prepend {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: String,
    },
    Append {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: String,
    },
    Increment {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: f64,
    },
    Decrement {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: f64,
    },
    Toggle {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
    },
    InsertFirst {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: Value,
    },
    InsertLast {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: Value,
    },
    InsertBefore {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: Value,
    },
    InsertAfter {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
        #[serde(rename = "Value")]
        value: Value,
    },
    DeleteFirst {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
    },
    DeleteLast {
        #[serde(rename = "Path")]
        path: Vec<PathElement>,
    },
}

impl Delta {
    /// Validate an untyped JSON value as a delta.
    pub fn from_value(value: &Value) -> Result<Delta> {
        serde_json::from_value(value.clone()).map_err(|e| Error::InvalidDelta(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_wire_shape() {
        let delta = Delta::Set {
            path: vec![PathElement::Key("items".into()), PathElement::Index(0)],
            value: json!("v"),
        };
        assert_eq!(
            serde_json::to_value(&delta).unwrap(),
            json!({"Operation": "Set", "Path": ["items", 0], "Value": "v"})
        );
    }

    #[test]
    fn parse_increment() {
        let delta = Delta::from_value(&json!({
            "Operation": "Increment",
            "Path": ["count"],
            "Value": 2,
        }))
        .unwrap();
        assert_eq!(
            delta,
            Delta::Increment {
                path: vec![PathElement::Key("count".into())],
                value: 2.0,
            }
        );
    }

    #[test]
    fn rejects_unknown_operation() {
        let result = Delta::from_value(&json!({"Operation": "Explode", "Path": []}));
        assert!(matches!(result, Err(Error::InvalidDelta(_))));
    }

    #[test]
    fn rejects_non_string_append_value() {
        let result = Delta::from_value(&json!({
            "Operation": "Append",
            "Path": ["text"],
            "Value": 3,
        }));
        assert!(matches!(result, Err(Error::InvalidDelta(_))));
    }

    #[test]
    fn rejects_missing_path() {
        let result = Delta::from_value(&json!({"Operation": "Toggle"}));
        assert!(matches!(result, Err(Error::InvalidDelta(_))));
    }
}
