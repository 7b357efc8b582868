use anyhow::Result;
use clap::Parser;
use service_lifecycle::{
    DefaultServiceMonitor, DefaultTranslate, I18nKey, LifecycleConfig, MessageBus, MockHooks,
    MockService, Service, ServiceHandle, ServiceMonitor, ServiceRegistry, State, SyncMessageBus,
    Translate,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "servicectl")]
#[command(about = "Host a set of lifecycle-managed services and report their status")]
#[command(version)]
#[command(long_about = "Builds the services described in a TOML configuration file, wires them \
to a synchronous message bus and a service monitor, starts the ones marked autostart and stops \
everything again on Ctrl-C.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "servicectl.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting any service")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Start, report and stop without waiting for Ctrl-C
    #[arg(long, help = "Start services, print their status, then stop them and exit")]
    once: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, value_name = "DIR", help = "Directory for daily rolling log files")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting servicectl v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match LifecycleConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let bus: Arc<dyn MessageBus> =
        Arc::new(SyncMessageBus::with_debug_logging(config.bus.debug_logging));
    let translate: Arc<dyn Translate> = Arc::new(DefaultTranslate);

    let monitor = if config.monitor.enabled {
        Some(DefaultServiceMonitor::new(Arc::clone(&bus)))
    } else {
        None
    };

    let registry = ServiceRegistry::new();
    // Keep concrete handles so each service outlives the registry and monitor
    let mut services: Vec<Arc<MockService>> = Vec::with_capacity(config.services.len());
    let mut autostart: Vec<ServiceHandle> = Vec::new();

    for definition in &config.services {
        let service = MockService::builder(MockHooks::from(definition))
            .name_key(definition.name_key.clone())
            .description_key(I18nKey::new(definition.description_key.clone()))
            .instance_number(definition.instance_number)
            .translate(Arc::clone(&translate))
            .message_bus(Arc::clone(&bus))
            .build()?;

        let key = registry.register(service.handle())?;
        info!("Registered service {} ({})", key, service.id());

        if definition.autostart {
            autostart.push(service.handle());
        }
        services.push(service);
    }

    start_services(autostart).await;
    print_status(&registry, monitor.as_deref());

    if !args.once {
        info!("Services running, press Ctrl-C to stop");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    }

    // Stopping runs blocking hooks, keep them off the async workers
    let shutdown = tokio::task::spawn_blocking(move || {
        match monitor {
            Some(monitor) if config.monitor.stop_all_on_shutdown => {
                monitor.stop_all_services();
                // Services never started are unknown to the monitor
                registry.stop_all();
            }
            _ => registry.stop_all(),
        }
        registry
    });
    let registry = shutdown.await?;

    print_status(&registry, None);

    let failed: Vec<String> = services
        .iter()
        .filter(|service| service.cause().is_failure())
        .map(|service| service.name())
        .collect();

    if failed.is_empty() {
        info!("All services stopped cleanly");
        Ok(())
    } else {
        error!("Services ended in FAILED state: {}", failed.join(", "));
        std::process::exit(1);
    }
}

async fn start_services(services: Vec<ServiceHandle>) {
    let tasks: Vec<_> = services
        .into_iter()
        .map(|service| {
            tokio::task::spawn_blocking(move || {
                let name = service.name();
                match service.start() {
                    Ok(status) if status.state == State::Running => {
                        info!("Service {} is running", name)
                    }
                    Ok(status) => warn!(
                        "Service {} did not start: {} ({})",
                        name, status.state, status.cause
                    ),
                    Err(e) => error!("Service {} could not be started: {}", name, e),
                }
            })
        })
        .collect();

    for task in tasks {
        if let Err(e) = task.await {
            error!("Start task failed: {}", e);
        }
    }
}

fn print_status(registry: &ServiceRegistry, monitor: Option<&DefaultServiceMonitor>) {
    println!("{:<24} {:>8} {:<12} {:<16} {}", "SERVICE", "INSTANCE", "STATE", "CAUSE", "LAST START");
    for service in registry.services() {
        let last_start = monitor
            .map(|monitor| monitor.service_status(&service))
            .filter(|record| !record.empty && record.last_start_time.timestamp() > 0)
            .map(|record| record.last_start_time.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<24} {:>8} {:<12} {:<16} {}",
            service.name(),
            service.instance_number(),
            service.state().to_string(),
            service.cause().to_string(),
            last_start
        );
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "service_lifecycle={},servicectl={}",
            log_level, log_level
        ))
    });

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "servicectl.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# servicectl configuration file");
    println!("# Every [[services]] entry is hosted as a scripted mock service");
    println!();
    println!("{}", LifecycleConfig::default().to_toml()?);
    Ok(())
}
