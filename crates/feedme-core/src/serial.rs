//! Canonical feed identity
//!
//! A feed is addressed by its name plus a set of string-valued arguments.
//! Subscription state is keyed by the feed serial: a canonical JSON encoding
//! of the (name, args) pair that compares equal exactly when two references
//! address the same feed. Argument order never matters because the args live
//! in a `BTreeMap` and serde_json encodes object keys in map order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Feed arguments: zero or more string key/value pairs.
pub type FeedArgs = BTreeMap<String, String>;

/// A (feed name, feed args) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedIdentity {
    pub name: String,
    pub args: FeedArgs,
}

impl FeedIdentity {
    pub fn new(name: impl Into<String>, args: FeedArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Canonical, equality-comparable encoding of this identity.
    pub fn serial(&self) -> FeedSerial {
        // Struct field order is fixed and the args map is sorted, so the
        // encoding is canonical. Encoding a string/map pair cannot fail.
        let text = serde_json::to_string(self).unwrap_or_default();
        FeedSerial(text)
    }
}

/// Opaque equality key for a feed identity, with an inverse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedSerial(String);

impl FeedSerial {
    /// Decode back into the (name, args) pair.
    pub fn identity(&self) -> Result<FeedIdentity> {
        serde_json::from_str(&self.0).map_err(|e| Error::InvalidSerial(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> FeedArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn serial_roundtrip() {
        let identity = FeedIdentity::new("prices", args(&[("market", "nyse"), ("symbol", "x")]));
        let serial = identity.serial();
        assert_eq!(serial.identity().unwrap(), identity);
    }

    #[test]
    fn serial_ignores_argument_insertion_order() {
        let mut a = FeedArgs::new();
        a.insert("b".into(), "2".into());
        a.insert("a".into(), "1".into());

        let mut b = FeedArgs::new();
        b.insert("a".into(), "1".into());
        b.insert("b".into(), "2".into());

        assert_eq!(
            FeedIdentity::new("f", a).serial(),
            FeedIdentity::new("f", b).serial()
        );
    }

    #[test]
    fn serial_distinguishes_name_and_args() {
        let base = FeedIdentity::new("f", args(&[("a", "1")])).serial();
        assert_ne!(base, FeedIdentity::new("g", args(&[("a", "1")])).serial());
        assert_ne!(base, FeedIdentity::new("f", args(&[("a", "2")])).serial());
        assert_ne!(base, FeedIdentity::new("f", FeedArgs::new()).serial());
    }
}
