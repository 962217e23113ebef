//! NextGCore SWx Proxy
//!
//! Authentication proxy for non-3GPP access:
//! - `Authenticate` RPC (HTTP/2 JSON) towards the ePDG / AAA front end
//! - SWx Diameter client towards the HSS (MAR/MAA, SAR/SAA)
//! - Authentication vector cache

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swx_proxyd::{AuthProxy, DiameterSender, SwxConnection, SwxProxyConfig, SwxProxyContext, SwxSbiServer};

/// NextGCore SWx Proxy - non-3GPP authentication proxy
#[derive(Parser, Debug)]
#[command(name = "swx-proxyd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SWx authentication proxy between non-3GPP access and the HSS", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, default_value = "/etc/nextgcore/swx_proxy.yaml")]
    config: String,

    /// Log file path
    #[arg(short = 'l', long)]
    log_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(short = 'm', long)]
    no_color: bool,

    /// SBI server address (overrides config)
    #[arg(long)]
    sbi_addr: Option<String>,

    /// SBI server port (overrides config)
    #[arg(long)]
    sbi_port: Option<u16>,

    /// HSS Diameter address host:port (overrides config)
    #[arg(long)]
    hss_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    log::info!("NextGCore SWx Proxy v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let mut config = SwxProxyConfig::load(Path::new(&args.config))
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;
    log::info!(
        "HSS {} (origin {}@{}), timeout {}ms, cache {}",
        config.diameter.hss_addr,
        config.diameter.origin_host,
        config.diameter.origin_realm,
        config.timeout_ms,
        if config.cache.enabled { "enabled" } else { "disabled" }
    );

    let sbi_addr: SocketAddr = format!("{}:{}", config.sbi.addr, config.sbi.port)
        .parse()
        .with_context(|| format!("Invalid SBI address {}:{}", config.sbi.addr, config.sbi.port))?;

    let diameter = config.diameter.clone();
    let connect_timeout = config.timeout();
    let mut connection = None;
    let ctx = SwxProxyContext::new(config, |dispatcher| {
        let conn = Arc::new(SwxConnection::new(diameter, dispatcher, connect_timeout));
        connection = Some(conn.clone());
        conn as Arc<dyn DiameterSender>
    });

    let gc_task = ctx
        .cache
        .clone()
        .map(|cache| cache.spawn_gc(ctx.config.cache.gc_interval()));

    let server = SwxSbiServer::new(sbi_addr);
    server
        .start(AuthProxy::new(ctx.clone()))
        .await
        .context("Failed to start SBI server")?;

    log::info!("NextGCore SWx Proxy ready");

    run_event_loop_async(&ctx, shutdown).await?;

    log::info!("Shutting down...");

    server.stop().await;
    log::info!("SBI server stopped");

    if let Some(task) = gc_task {
        task.abort();
    }
    if let Some(conn) = connection {
        conn.close().await;
    }

    ctx.stats.log_summary();
    log::info!("NextGCore SWx Proxy stopped");
    Ok(())
}

/// Apply command line overrides on top of the loaded configuration
fn apply_overrides(config: &mut SwxProxyConfig, args: &Args) {
    if let Some(addr) = &args.sbi_addr {
        config.sbi.addr = addr.clone();
    }
    if let Some(port) = args.sbi_port {
        config.sbi.port = port;
    }
    if let Some(hss_addr) = &args.hss_addr {
        config.diameter.hss_addr = hss_addr.clone();
    }
}

/// Initialize logging based on command line arguments
fn init_logging(args: &Args) -> Result<()> {
    let mut builder = env_logger::Builder::new();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    builder.filter_level(level);
    builder.format_timestamp_millis();

    if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }

    if let Some(path) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();

    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(())
}

/// Main event loop; logs the counters once a minute while idling
async fn run_event_loop_async(ctx: &SwxProxyContext, shutdown: Arc<AtomicBool>) -> Result<()> {
    log::debug!("Entering async main event loop");

    let mut interval = tokio::time::interval(Duration::from_millis(100));
    let mut ticks: u64 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        interval.tick().await;
        ticks += 1;

        if ticks % 600 == 0 {
            log::debug!(
                "Pending SWx requests: {}, cached users: {}",
                ctx.tracker.len(),
                ctx.cache.as_ref().map_or(0, |c| c.len())
            );
        }
    }

    log::debug!("Exiting async main event loop");
    Ok(())
}
