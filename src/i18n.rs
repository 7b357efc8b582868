use crate::key::I18nKey;
use std::collections::HashMap;

/// Resolves opaque keys into display strings.
///
/// Unknown keys are the implementation's concern; the lifecycle code only
/// passes keys through.
pub trait Translate: Send + Sync {
    fn from(&self, key: &I18nKey) -> String;
}

/// Renders a key's own name with underscores turned into spaces
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTranslate;

impl Translate for DefaultTranslate {
    fn from(&self, key: &I18nKey) -> String {
        key.name().replace('_', " ")
    }
}

/// Table-backed translator that falls back to [`DefaultTranslate`]
#[derive(Debug, Default, Clone)]
pub struct MapTranslate {
    entries: HashMap<I18nKey, String>,
}

impl MapTranslate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry<K: Into<I18nKey>, S: Into<String>>(mut self, key: K, value: S) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

impl Translate for MapTranslate {
    fn from(&self, key: &I18nKey) -> String {
        match self.entries.get(key) {
            Some(value) => value.clone(),
            None => DefaultTranslate.from(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_translate_renders_key_name() {
        assert_eq!(DefaultTranslate.from(&I18nKey::NOT_SPECIFIED), "not specified");
        assert_eq!(DefaultTranslate.from(&I18nKey::from("No")), "No");
    }

    #[test]
    fn test_map_translate_prefers_entries() {
        let translate = MapTranslate::new().with_entry("payment_gateway", "Payment Gateway");
        assert_eq!(
            translate.from(&I18nKey::from("payment_gateway")),
            "Payment Gateway"
        );
        assert_eq!(translate.from(&I18nKey::from("audit_log")), "audit log");
    }
}
