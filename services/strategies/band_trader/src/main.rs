//! Band trader service entry point
//!
//! Wires the exchange adapter to the strategy: seeds one rolling window per
//! tracked symbol from REST history, keeps the windows updated from the
//! kline stream, runs the indicator sweep on a fixed cadence, and feeds the
//! resulting signals into the single-position manager. Telegram handles
//! both outbound alerts and the operator command surface when a bot token
//! is configured.

mod audit;
mod balances;
mod config;
mod db;
mod error;
mod evaluator;
mod position;
mod telegram;
mod trade;

use anyhow::{Context, Result};
use binance_adapter::{preload_klines, KlineStream};
use market::{stream_key, KlineWindow, StreamEvent};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::audit::AuditWriter;
use crate::balances::BalanceLedger;
use crate::config::{resolve_config_path, StrategyConfig};
use crate::db::TradeStore;
use crate::evaluator::Evaluator;
use crate::position::PositionManager;
use crate::telegram::{Alerter, CommandHandler, LogAlerter, TelegramNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = resolve_config_path("BAND_TRADER_CONFIG", "configs/band_trader.toml");
    let config =
        StrategyConfig::load(&config_path).context("failed to load band trader configuration")?;
    info!(
        instance = %config.instance,
        symbols = config.symbols.len(),
        interval = %config.interval,
        config = %config_path.display(),
        "starting band trader"
    );

    let store =
        Arc::new(TradeStore::open(&config.database_url).context("failed to open trade store")?);
    let audit =
        AuditWriter::new(&config.audit_dir).context("failed to prepare audit directory")?;
    let ledger = Arc::new(BalanceLedger::default());

    let telegram = (!config.telegram.token.is_empty())
        .then(|| TelegramNotifier::new(config.telegram.token.clone(), config.telegram.chat_id));
    let alerter: Arc<dyn Alerter> = match &telegram {
        Some(notifier) => Arc::new(notifier.clone()),
        None => {
            info!("no telegram token configured, alerts go to the log");
            Arc::new(LogAlerter)
        }
    };

    let (stream, driver) = KlineStream::spawn(config.binance.clone());

    // Seed each window from REST history, then keep it live from the
    // websocket. A failed preload starts that window empty; it fills as
    // candles arrive and is skipped by the sweep until then.
    let client = reqwest::Client::new();
    let mut windows = BTreeMap::new();
    let mut ingest_tasks = Vec::new();
    for symbol in &config.symbols {
        let bars = match preload_klines(
            &client,
            &config.binance,
            symbol,
            config.interval,
            config.window_capacity,
        )
        .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "kline preload failed, starting empty");
                Vec::new()
            }
        };
        let mut window = KlineWindow::new(symbol.clone(), config.interval, config.window_capacity);
        for bar in bars {
            window.apply(bar);
        }
        info!(symbol = %symbol, bars = window.len(), "window seeded");
        let window = Arc::new(RwLock::new(window));
        windows.insert(symbol.clone(), Arc::clone(&window));

        let key = stream_key(symbol, config.interval);
        let mut events = stream
            .subscribe(key)
            .context("websocket driver gone during startup")?;
        ingest_tasks.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let StreamEvent::Kline(kline) = event {
                    window.write().apply(kline.bar);
                }
            }
        }));
    }

    let mut balance_events = stream
        .subscribe(config.binance.balance_stream.clone())
        .context("websocket driver gone during startup")?;
    let balance_ledger = Arc::clone(&ledger);
    let balance_task = tokio::spawn(async move {
        while let Some(event) = balance_events.recv().await {
            if let StreamEvent::Balance(deltas) = event {
                balance_ledger.apply(&deltas);
            }
        }
    });

    let mut evaluator = Evaluator::new(windows, audit, Arc::clone(&alerter), &config);
    let mut position = PositionManager::new(
        Arc::clone(&store),
        Arc::clone(&alerter),
        config.thresholds.clone(),
    )
    .context("failed to restore position state")?;
    let snapshot = position.snapshot_handle();

    let poller = telegram.map(|notifier| {
        let handler = CommandHandler::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            snapshot,
            config.instance.clone(),
            config.interval,
            config.symbols.len(),
            config.thresholds.trailing_drop,
        );
        tokio::spawn(telegram::run_commands(
            notifier,
            handler,
            config.telegram.poll_timeout_secs,
        ))
    });

    let evaluate_every = Duration::from_secs(config.evaluate_secs);
    let mut evaluation = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(evaluate_every);
        loop {
            ticker.tick().await;
            let signals = evaluator.evaluate_all();
            if let Err(e) = position.on_tick(&signals) {
                error!(error = %e, "trade persistence failed, stopping evaluation");
                break;
            }
        }
    });

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            info!("shutdown signal received");
        }
        _ = &mut evaluation => {
            error!("evaluation loop stopped, shutting down");
        }
    }

    if let Some(poller) = poller {
        poller.abort();
    }
    evaluation.abort();
    balance_task.abort();
    for task in ingest_tasks {
        task.abort();
    }
    driver.abort();
    Ok(())
}
