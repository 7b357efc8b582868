pub mod bus;
pub mod config;
pub mod error;
pub mod i18n;
pub mod key;
pub mod mock;
pub mod monitor;
pub mod registry;
pub mod rehydrate;
pub mod service;
pub mod state;
pub mod status;

pub use bus::{BusListener, MessageBus, ServiceBusMessage, SubscriptionId, SyncMessageBus, WeakListener};
pub use config::{BusConfig, LifecycleConfig, MonitorConfig, ServiceDefinition};
pub use error::{Result, ServiceError};
pub use i18n::{DefaultTranslate, MapTranslate, Translate};
pub use key::{I18nKey, ServiceId, ServiceKey};
pub use mock::{MockHooks, MockService};
pub use monitor::{DefaultServiceMonitor, ServiceMonitor};
pub use registry::ServiceRegistry;
pub use rehydrate::{rehydrate_json, PersistedService, RehydrationContext};
pub use service::{ManagedService, ManagedServiceBuilder, Service, ServiceHandle, ServiceHooks};
pub use state::{Cause, State};
pub use status::{ServiceStatus, ServiceStatusRecord};
