//! Redacted handling of repository passwords.
//!
//! A profile's password is only ever handed to restic through the child
//! process environment, so the value must never leak through `Debug` output,
//! logs, or re-serialized configuration. Memory is zeroed on drop.

use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Formatter};
use std::result;
use zeroize::Zeroize;

/// Placeholder shown in place of the actual secret in logs and serialized output
pub static REDACTED_SECRET: &str = "###REDACTED###";

/// A string that is redacted everywhere except [`Secret::expose`].
#[derive(Clone, Default, Zeroize, PartialEq, Eq)]
pub struct Secret {
    inner: String,
}

impl Secret {
    pub fn new<S: Into<String>>(inner: S) -> Self {
        Self {
            inner: inner.into(),
        }
    }

    /// The actual secret value. Call sites should pass this straight into the
    /// child process environment and nowhere else.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", REDACTED_SECRET)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED_SECRET)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_str(SecretVisitor)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.zeroize();
    }
}

struct SecretVisitor;

impl Visitor<'_> for SecretVisitor {
    type Value = Secret;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a string")
    }

    fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(Secret::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::new("hunter2-hunter2");
        let shown = format!("{:?}", secret);
        assert_eq!(shown, REDACTED_SECRET);
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_serialize_is_redacted() {
        let secret = Secret::new("hunter2-hunter2");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, format!("\"{}\"", REDACTED_SECRET));
    }

    #[test]
    fn test_deserialize_keeps_value() {
        let secret: Secret = serde_yml::from_str("swordfish").unwrap();
        assert_eq!(secret.expose(), "swordfish");
    }

    #[test]
    fn test_empty_default() {
        let secret = Secret::default();
        assert!(secret.is_empty());
    }
}
