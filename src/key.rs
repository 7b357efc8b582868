use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;

/// Opaque key resolved to a display string by a [`Translate`](crate::i18n::Translate)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct I18nKey(Cow<'static, str>);

impl I18nKey {
    pub const NOT_SPECIFIED: I18nKey = I18nKey(Cow::Borrowed("not_specified"));

    pub fn new<S: Into<Cow<'static, str>>>(key: S) -> Self {
        Self(key.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for I18nKey {
    fn default() -> Self {
        Self::NOT_SPECIFIED
    }
}

impl fmt::Display for I18nKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for I18nKey {
    fn from(key: &'static str) -> Self {
        Self::new(key)
    }
}

impl From<String> for I18nKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// Identifies a kind of service, derived from its name key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceKey(I18nKey);

impl ServiceKey {
    pub fn new(key: I18nKey) -> Self {
        Self(key)
    }
}

impl From<I18nKey> for ServiceKey {
    fn from(key: I18nKey) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}

/// Identity of one service instance. Survives persistence, so a
/// rehydrated instance is the same instance as far as the monitor is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Uuid);

impl ServiceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_key_displays_key_name() {
        let key = ServiceKey::new(I18nKey::new("Authorisation"));
        assert_eq!(key.to_string(), "Authorisation");
    }

    #[test]
    fn test_service_key_equality_follows_name_key() {
        let a = ServiceKey::from(I18nKey::from("ledger"));
        let b = ServiceKey::from(I18nKey::new(String::from("ledger")));
        assert_eq!(a, b);
        assert_ne!(a, ServiceKey::from(I18nKey::from("audit")));
    }

    #[test]
    fn test_default_key_is_not_specified() {
        assert_eq!(I18nKey::default(), I18nKey::NOT_SPECIFIED);
        assert_eq!(I18nKey::default().name(), "not_specified");
    }

    #[test]
    fn test_service_ids_are_unique() {
        assert_ne!(ServiceId::new(), ServiceId::new());
    }
}
