//! Arbitrage Monitor
//!
//! Polls binary Polymarket markets, detects mirrored-book mispricings and
//! scores them against live ask depth. Never places orders.

mod monitor;

use anyhow::Result;
use polymarket_core::api::ClobClient;
use polymarket_core::config::Config;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const HEALTH_FILE: &str = "/tmp/healthy";

fn touch_health_file() {
    let _ = std::fs::write(HEALTH_FILE, format!("{}", chrono::Utc::now().timestamp()));
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "arb_monitor=info,trading_engine=info,polymarket_core=warn,hyper=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Arbitrage Monitor");
    touch_health_file();

    let config = Config::from_env()?;
    let settings = monitor::MonitorSettings::from_env()?;
    let clob_client = ClobClient::new(config.polymarket.clob_url)?;

    info!(
        base_url = %clob_client.base_url(),
        markets = settings.markets.len(),
        min_profit = %settings.min_profit_threshold,
        "Monitor configured"
    );

    let mut monitor = monitor::ArbMonitor::new(settings, Arc::new(clob_client));
    monitor.run().await?;

    Ok(())
}
