use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use panel_monitoring::{
    alerts::AlertStore,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::read_config_file,
    engine::MonitorEngine,
    fanout::FanOutHub,
    store::TimeSeriesStore,
    thresholds::ThresholdRegistry,
    util,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Bind address override (defaults to HUB_ADDR:HUB_PORT)
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("panel_monitoring", LevelFilter::TRACE),
        ("hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Default::default(),
    };

    let series = Arc::new(TimeSeriesStore::new(
        config.retention.max_samples,
        config.retention.max_age(),
    ));
    let thresholds = Arc::new(ThresholdRegistry::new());
    let alerts = Arc::new(AlertStore::new());
    let fanout = Arc::new(FanOutHub::new(
        config.fanout.delivery_timeout(),
        config.fanout.subscriber_buffer,
    ));

    let engine = Arc::new(MonitorEngine::new(
        series,
        thresholds,
        alerts,
        Arc::new(fanout.publisher()),
    ));

    let api_config = ApiConfig {
        bind_addr: args
            .bind
            .unwrap_or_else(|| (util::get_addr(), util::get_port()).into()),
        enable_cors: true,
    };
    let addr = spawn_api_server(api_config, ApiState::new(engine, fanout)).await?;
    info!("hub ready on {addr}");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    Ok(())
}
