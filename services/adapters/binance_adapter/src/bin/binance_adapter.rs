//! Standalone stream tail for operational smoke checks
//!
//! Connects to the combined stream, subscribes to the given keys, and logs
//! every decoded event. Useful for verifying connectivity and stream names
//! without starting a strategy.

use anyhow::Result;
use binance_adapter::{BinanceConfig, KlineStream};
use clap::Parser;
use market::StreamEvent;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "binance_adapter", about = "Tail decoded Binance stream events")]
struct Args {
    /// TOML config file; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Stream keys to subscribe, e.g. solusdt@kline_15m or !balance@arr
    #[arg(required = true)]
    streams: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => BinanceConfig::from_file(path)?,
        None => BinanceConfig::default(),
    };

    let (stream, driver) = KlineStream::spawn(config);
    let mut tails = Vec::new();
    for key in &args.streams {
        let mut events = stream.subscribe(key.clone())?;
        let key = key.clone();
        tails.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    StreamEvent::Kline(kline) => info!(
                        stream = %key,
                        symbol = %kline.symbol,
                        close = kline.bar.close,
                        final_bar = kline.is_final,
                        "kline"
                    ),
                    StreamEvent::Balance(deltas) => {
                        info!(stream = %key, assets = deltas.len(), "balance update");
                    }
                }
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    for tail in &tails {
        tail.abort();
    }
    driver.abort();
    Ok(())
}
