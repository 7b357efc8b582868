use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Services hosted by `servicectl`
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BusConfig {
    /// Log every published notification at debug level
    #[serde(default = "default_bus_debug_logging")]
    pub debug_logging: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Attach a service monitor to the bus
    #[serde(default = "default_monitor_enabled")]
    pub enabled: bool,

    /// Stop every monitored service on shutdown
    #[serde(default = "default_stop_all_on_shutdown")]
    pub stop_all_on_shutdown: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceDefinition {
    /// Key rendered as the service name; also its service key
    pub name_key: String,

    #[serde(default = "default_description_key")]
    pub description_key: String,

    #[serde(default)]
    pub instance_number: u32,

    /// Simulated startup time in milliseconds
    #[serde(default)]
    pub start_delay_ms: u64,

    /// Simulated shutdown time in milliseconds
    #[serde(default)]
    pub stop_delay_ms: u64,

    #[serde(default)]
    pub fail_to_start: bool,

    #[serde(default)]
    pub fail_to_stop: bool,

    #[serde(default)]
    pub fail_to_reset: bool,

    /// Start this service as soon as the host is up
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

impl ServiceDefinition {
    pub fn new<S: Into<String>>(name_key: S) -> Self {
        Self {
            name_key: name_key.into(),
            description_key: default_description_key(),
            instance_number: 0,
            start_delay_ms: 0,
            stop_delay_ms: 0,
            fail_to_start: false,
            fail_to_stop: false,
            fail_to_reset: false,
            autostart: default_autostart(),
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("bus.debug_logging", default_bus_debug_logging())?
            .set_default("monitor.enabled", default_monitor_enabled())?
            .set_default("monitor.stop_all_on_shutdown", default_stop_all_on_shutdown())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // SERVICECTL_BUS__DEBUG_LOGGING=true etc.
            .add_source(Environment::with_prefix("SERVICECTL").separator("__"))
            .build()?;

        let config: LifecycleConfig = settings.try_deserialize()?;

        info!(
            "Configuration loaded successfully ({} services)",
            config.services.len()
        );
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for service in &self.services {
            if service.name_key.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Service name_key must not be empty".to_string(),
                ));
            }

            if !seen.insert(service.name_key.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Service name_key '{}' is defined more than once",
                    service.name_key
                )));
            }
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            monitor: MonitorConfig::default(),
            services: vec![
                ServiceDefinition {
                    description_key: "audit_log_description".to_string(),
                    ..ServiceDefinition::new("audit_log")
                },
                ServiceDefinition {
                    description_key: "payment_gateway_description".to_string(),
                    start_delay_ms: 250,
                    stop_delay_ms: 100,
                    ..ServiceDefinition::new("payment_gateway")
                },
            ],
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            debug_logging: default_bus_debug_logging(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_monitor_enabled(),
            stop_all_on_shutdown: default_stop_all_on_shutdown(),
        }
    }
}

fn default_bus_debug_logging() -> bool {
    false
}

fn default_monitor_enabled() -> bool {
    true
}
fn default_stop_all_on_shutdown() -> bool {
    true
}

fn default_description_key() -> String {
    "not_specified".to_string()
}
fn default_autostart() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LifecycleConfig::default();

        assert!(config.validate().is_ok());
        assert!(config.monitor.enabled);
        assert!(!config.bus.debug_logging);
        assert_eq!(config.services.len(), 2);
    }

    #[test]
    fn test_config_validation() {
        let mut config = LifecycleConfig {
            services: vec![
                ServiceDefinition::new("ledger"),
                ServiceDefinition::new("ledger"),
            ],
            ..LifecycleConfig::default()
        };

        // Should fail validation due to the duplicate key
        assert!(config.validate().is_err());

        config.services[1].name_key = "  ".to_string();
        assert!(config.validate().is_err());

        config.services[1].name_key = "journal".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[bus]
debug_logging = true

[[services]]
name_key = "ledger"
start_delay_ms = 5
fail_to_stop = true

[[services]]
name_key = "journal"
instance_number = 3
autostart = false
"#
        )
        .unwrap();

        let config = LifecycleConfig::load_from_file(file.path()).unwrap();

        assert!(config.bus.debug_logging);
        assert!(config.monitor.enabled);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].name_key, "ledger");
        assert_eq!(config.services[0].start_delay_ms, 5);
        assert!(config.services[0].fail_to_stop);
        assert!(config.services[0].autostart);
        assert_eq!(config.services[0].description_key, "not_specified");
        assert_eq!(config.services[1].instance_number, 3);
        assert!(!config.services[1].autostart);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = LifecycleConfig::load_from_file("/nonexistent/servicectl.toml").unwrap();
        assert!(config.monitor.stop_all_on_shutdown);
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = LifecycleConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: LifecycleConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
