use super::{ManagedService, Service, ServiceHooks};
use crate::bus::MessageBus;
use crate::error::{Result, ServiceError};
use crate::i18n::{DefaultTranslate, Translate};
use crate::key::I18nKey;
use std::sync::Arc;

/// Builder for a [`ManagedService`]
pub struct ManagedServiceBuilder<H: ServiceHooks> {
    hooks: H,
    name_key: Option<I18nKey>,
    description_key: Option<I18nKey>,
    instance_number: u32,
    translate: Option<Arc<dyn Translate>>,
    message_bus: Option<Arc<dyn MessageBus>>,
}

impl<H: ServiceHooks> ManagedServiceBuilder<H> {
    pub fn new(hooks: H) -> Self {
        Self {
            hooks,
            name_key: None,
            description_key: None,
            instance_number: 0,
            translate: None,
            message_bus: None,
        }
    }

    pub fn name_key<K: Into<I18nKey>>(mut self, key: K) -> Self {
        self.name_key = Some(key.into());
        self
    }

    pub fn description_key<K: Into<I18nKey>>(mut self, key: K) -> Self {
        self.description_key = Some(key.into());
        self
    }

    pub fn instance_number(mut self, instance_number: u32) -> Self {
        self.instance_number = instance_number;
        self
    }

    pub fn translate(mut self, translate: Arc<dyn Translate>) -> Self {
        self.translate = Some(translate);
        self
    }

    pub fn message_bus(mut self, message_bus: Arc<dyn MessageBus>) -> Self {
        self.message_bus = Some(message_bus);
        self
    }

    /// Build the service; a translator defaults to [`DefaultTranslate`], the bus is required
    pub fn build(self) -> Result<Arc<ManagedService<H>>> {
        let message_bus = self
            .message_bus
            .ok_or_else(|| ServiceError::configuration("Message bus must be specified"))?;
        let translate = self
            .translate
            .unwrap_or_else(|| Arc::new(DefaultTranslate));

        let service = ManagedService::new(self.hooks, translate, message_bus);
        if let Some(name_key) = self.name_key {
            service.set_name_key(name_key);
        }
        if let Some(description_key) = self.description_key {
            service.set_description_key(description_key);
        }
        service.set_instance_number(self.instance_number);

        Ok(service)
    }
}
