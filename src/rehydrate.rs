use crate::bus::MessageBus;
use crate::error::{Result, ServiceError};
use crate::i18n::Translate;
use crate::key::{I18nKey, ServiceId};
use crate::service::{ManagedService, ServiceHooks};
use crate::state::{Cause, State};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Borrowed form written when a [`ManagedService`] is serialized
#[derive(Serialize)]
pub(crate) struct PersistedView<'a, H> {
    pub(crate) id: ServiceId,
    pub(crate) state: State,
    pub(crate) cause: Cause,
    pub(crate) instance_number: u32,
    pub(crate) name_key: &'a I18nKey,
    pub(crate) description_key: &'a I18nKey,
    pub(crate) hooks: &'a H,
}

/// Persisted form of a service, read back before [`ManagedService::rehydrate`].
///
/// Collaborators (translator, bus) are never persisted.
#[derive(Debug, Deserialize)]
pub struct PersistedService<H> {
    pub id: ServiceId,
    pub state: State,
    pub cause: Cause,
    pub instance_number: u32,
    pub name_key: I18nKey,
    pub description_key: I18nKey,
    pub hooks: H,
}

impl<H: DeserializeOwned> PersistedService<H> {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Collaborators handed to a service reconstructed from persisted form
#[derive(Clone, Default)]
pub struct RehydrationContext {
    translate: Option<Arc<dyn Translate>>,
    message_bus: Option<Arc<dyn MessageBus>>,
}

impl RehydrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translate(mut self, translate: Arc<dyn Translate>) -> Self {
        self.translate = Some(translate);
        self
    }

    pub fn with_message_bus(mut self, message_bus: Arc<dyn MessageBus>) -> Self {
        self.message_bus = Some(message_bus);
        self
    }

    pub fn translate(&self) -> Result<Arc<dyn Translate>> {
        self.translate
            .clone()
            .ok_or_else(|| ServiceError::configuration("Translate collaborator has not been set"))
    }

    pub fn message_bus(&self) -> Result<Arc<dyn MessageBus>> {
        self.message_bus
            .clone()
            .ok_or_else(|| ServiceError::configuration("MessageBus collaborator has not been set"))
    }

    /// Fails listing every collaborator that is still missing
    pub fn check(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.translate.is_none() {
            missing.push("translate");
        }
        if self.message_bus.is_none() {
            missing.push("message_bus");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::configuration(format!(
                "Rehydration context is missing required collaborators: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Read a service serialized as JSON and reconstruct it against `context`
pub fn rehydrate_json<H>(json: &str, context: &RehydrationContext) -> Result<Arc<ManagedService<H>>>
where
    H: ServiceHooks + DeserializeOwned,
{
    let persisted = PersistedService::<H>::from_json(json)?;
    ManagedService::rehydrate(persisted, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SyncMessageBus;
    use crate::i18n::DefaultTranslate;
    use crate::mock::{MockHooks, MockService};
    use crate::service::Service;

    #[test]
    fn test_check_reports_all_missing_collaborators() {
        let err = RehydrationContext::new().check().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("translate"));
        assert!(message.contains("message_bus"));
    }

    #[test]
    fn test_check_passes_when_complete() {
        let context = RehydrationContext::new()
            .with_translate(Arc::new(DefaultTranslate))
            .with_message_bus(Arc::new(SyncMessageBus::new()));
        assert!(context.check().is_ok());
    }

    #[test]
    fn test_rehydrate_without_bus_is_configuration_error() {
        let bus = Arc::new(SyncMessageBus::new());
        let service = MockService::with_defaults(MockHooks::new(), bus);
        let json = serde_json::to_string(&*service).unwrap();

        let context = RehydrationContext::new().with_translate(Arc::new(DefaultTranslate));
        let result = rehydrate_json::<MockHooks>(&json, &context);

        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }

    #[test]
    fn test_rehydrate_rejects_malformed_json() {
        let context = RehydrationContext::new()
            .with_translate(Arc::new(DefaultTranslate))
            .with_message_bus(Arc::new(SyncMessageBus::new()));
        let result = rehydrate_json::<MockHooks>("{ not json", &context);
        assert!(matches!(result, Err(ServiceError::Json(_))));
    }

    #[test]
    fn test_persisted_form_keeps_identity_and_keys() {
        let bus = Arc::new(SyncMessageBus::new());
        let service = MockService::with_defaults(MockHooks::new(), bus);
        service.set_name_key(I18nKey::from("ledger"));
        service.set_instance_number(7);

        let json = serde_json::to_string(&*service).unwrap();
        let persisted = PersistedService::<MockHooks>::from_json(&json).unwrap();

        assert_eq!(persisted.id, service.id());
        assert_eq!(persisted.name_key, I18nKey::from("ledger"));
        assert_eq!(persisted.instance_number, 7);
        assert_eq!(persisted.state, State::Initial);
    }
}
