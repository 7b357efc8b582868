use crate::error::{Result, ServiceError};
use crate::key::ServiceKey;
use crate::service::ServiceHandle;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Services registered by [`ServiceKey`], so hosts can look them up without
/// knowing their concrete type
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<BTreeMap<ServiceKey, ServiceHandle>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its current service key
    pub fn register(&self, service: ServiceHandle) -> Result<ServiceKey> {
        let key = service.service_key();
        let mut services = self.services.write();
        if services.contains_key(&key) {
            warn!("Rejected duplicate registration of service key {}", key);
            return Err(ServiceError::DuplicateServiceKey {
                key: key.to_string(),
            });
        }
        debug!("Registered service {} ({})", key, service.id());
        services.insert(key.clone(), service);
        Ok(key)
    }

    pub fn unregister(&self, key: &ServiceKey) -> Option<ServiceHandle> {
        self.services.write().remove(key)
    }

    pub fn get(&self, key: &ServiceKey) -> Option<ServiceHandle> {
        self.services.read().get(key).cloned()
    }

    /// Registered keys in key order
    pub fn keys(&self) -> Vec<ServiceKey> {
        self.services.read().keys().cloned().collect()
    }

    pub fn services(&self) -> Vec<ServiceHandle> {
        self.services.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Stop every registered service, in reverse key order
    pub fn stop_all(&self) {
        let services = self.services();
        info!("Stopping {} registered services", services.len());
        for service in services.into_iter().rev() {
            service.stop();
        }
    }
}
