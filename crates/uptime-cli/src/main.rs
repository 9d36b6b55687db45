mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use uptime_core::prober::EndpointProber;
use uptime_core::registry::EndpointSpec;
use uptime_core::{
    notification_channel, CheckerConfig, HealthMonitor, HttpProber, NotificationDispatcher,
    TelegramClient,
};

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    if GIT_HASH.is_empty() {
        // Leak is fine — called once, lives for the program's lifetime.
        Box::leak(VERSION.to_string().into_boxed_str())
    } else {
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// Endpoint uptime monitor with Telegram notifications.
#[derive(Parser)]
#[command(name = "uptime-monitor", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server and the periodic health checks.
    Serve {
        /// Listen address (e.g. 0.0.0.0:5000). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Probe every configured endpoint once and print the results.
    Check {
        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Per-request timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => run_serve(listen, config).await,
        Commands::Check { config, timeout } => {
            let code = run_check(config, timeout).await;
            std::process::exit(code);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<config::AppConfig, String> {
    let mut app_config = match path {
        Some(p) => config::AppConfig::load(p)?,
        None => config::AppConfig::default(),
    };
    app_config.apply_env(|key| std::env::var(key).ok());
    Ok(app_config)
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<PathBuf>) {
    let app_config = match load_config(config_path.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            init_tracing("pretty");
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&app_config.server.log_format);
    if let Some(ref path) = config_path {
        tracing::info!(path = %path.display(), "Loaded config file");
    }

    let sink_config = match app_config.sink_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let endpoints = match app_config.registry_source().load() {
        Ok(specs) => specs,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = validate_endpoints(&endpoints) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    let listen = listen_override.unwrap_or(app_config.server.listen);
    let checker_config = app_config.checker_config();

    let notifier = Arc::new(TelegramClient::new(sink_config));

    tracing::info!("Testing Telegram bot connection...");
    match notifier.test_connection().await {
        Ok(username) => tracing::info!(bot = %username, "Telegram bot connection successful"),
        Err(e) => {
            tracing::error!(error = %e, "Telegram bot connection failed");
            std::process::exit(1);
        }
    }

    let (notification_tx, notification_rx) = notification_channel();
    let dispatcher = NotificationDispatcher::new(notification_rx, (*notifier).clone());
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    let prober = Arc::new(HttpProber::new(checker_config.probe_timeout));
    let monitor = Arc::new(HealthMonitor::new(
        endpoints,
        checker_config.clone(),
        prober,
        Some(notification_tx.clone()),
    ));
    Arc::clone(&monitor).start().await;

    let startup = startup_message(&monitor, &checker_config);
    if let Err(e) = notifier.send_message(&startup, "Markdown").await {
        tracing::warn!(error = %e, "Failed to send startup notification");
    }

    let state = uptime_api::state::AppState::new(Arc::clone(&monitor), Arc::clone(&notifier))
        .with_monitored_branches(app_config.gitlab.monitored_branches.clone());

    tracing::info!(%listen, "Starting webhook server");
    if let Err(e) = uptime_api::serve_with_state(listen, state, uptime_api::shutdown_signal()).await
    {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }

    tracing::info!("Shutdown signal received, stopping health monitor...");
    monitor.stop().await;

    drop(notification_tx);

    match tokio::time::timeout(std::time::Duration::from_secs(5), dispatcher_handle).await {
        Ok(_) => tracing::info!("Notification dispatcher shut down"),
        Err(_) => tracing::warn!("Notification dispatcher did not shut down in time, aborting"),
    }

    tracing::info!("Shutdown complete");
}

fn startup_message(monitor: &HealthMonitor, config: &CheckerConfig) -> String {
    format!(
        "🤖 **Uptime Monitor Started**\n\n\
         ✅ Deployment endpoint: `/notify/deployment`\n\
         ✅ Custom message endpoint: `/notify/message`\n\
         ✅ Test endpoint: `/webhook/test`\n\
         ✅ Health checks: Every {}s\n\
         ✅ Monitoring {} endpoint(s)",
        config.check_interval.as_secs(),
        monitor.endpoints().len()
    )
}

fn validate_endpoints(endpoints: &[EndpointSpec]) -> Result<(), String> {
    for spec in endpoints {
        let parsed = url::Url::parse(&spec.url)
            .map_err(|e| format!("Invalid monitor URL '{}': {}", spec.url, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(format!("Monitor URL must use http or https: {}", spec.url));
        }
    }
    Ok(())
}

async fn run_check(config_path: Option<PathBuf>, timeout_override: Option<u64>) -> i32 {
    let app_config = match load_config(config_path.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return 2;
        }
    };

    let endpoints = match app_config.registry_source().load() {
        Ok(specs) => specs,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return 2;
        }
    };

    if endpoints.is_empty() {
        eprintln!("{}", style("No monitor endpoints configured.").yellow());
        return 2;
    }

    let mut checker_config = app_config.checker_config();
    if let Some(secs) = timeout_override {
        checker_config = checker_config.with_probe_timeout(secs);
    }

    let prober = HttpProber::new(checker_config.probe_timeout);

    println!(
        "{} {}",
        style("uptime-monitor").bold(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
    println!();

    let bar = ProgressBar::new(endpoints.len() as u64).with_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}").expect("valid template"),
    );

    let mut results = Vec::with_capacity(endpoints.len());
    for spec in &endpoints {
        bar.set_message(spec.url.clone());
        results.push(prober.probe(spec).await);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let mut down_count = 0usize;
    for result in &results {
        if result.is_up() {
            let secs = result.response_time.map(|d| d.as_secs_f64()).unwrap_or(0.0);
            println!(
                "  {} {:<32} {:.2}s  {}",
                style("✔").green().bold(),
                result.display_name,
                secs,
                style(&result.url).dim(),
            );
        } else {
            down_count += 1;
            println!(
                "  {} {:<32} {}  {}",
                style("✘").red().bold(),
                result.display_name,
                style(result.error.as_deref().unwrap_or("Unknown error")).red(),
                style(&result.url).dim(),
            );
        }
    }

    println!();
    let up_count = results.len() - down_count;
    if down_count == 0 {
        println!(
            "{}",
            style(format!("All services are UP ({}/{})", up_count, results.len())).green()
        );
        0
    } else {
        println!(
            "{}",
            style(format!("{} service(s) DOWN, {} UP", down_count, up_count))
                .red()
                .bold()
        );
        1
    }
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => {
            fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}
