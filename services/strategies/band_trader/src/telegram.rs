//! Telegram delivery and the operator command surface
//!
//! Outbound messages are fire-and-forget: trading logic never waits on
//! delivery and failures are logged, not retried. Inbound commands come
//! from a getUpdates long-poll restricted to the configured chat and are
//! read-only views over store and position state, except for the /notify
//! mute toggle.

use market::Interval;
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::balances::BalanceLedger;
use crate::db::TradeStore;
use crate::error::{Result, StrategyError};
use crate::position::PositionSnapshot;
use crate::trade::compound_return;

const API_BASE: &str = "https://api.telegram.org";

/// Outbound notification sink.
///
/// The mute toggle gates only `alert_signal`; trade lifecycle messages
/// and command replies always go out.
pub trait Alerter: Send + Sync {
    /// Plain text message
    fn alert(&self, text: &str);
    /// Markdown message, used for fixed-width trade blocks
    fn alert_formatted(&self, text: &str);
    /// BUY/SELL change alert, suppressed while muted
    fn alert_signal(&self, text: &str);
}

/// Used when no bot token is configured; alerts land in the log.
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, text: &str) {
        info!(message = %text, "alert");
    }

    fn alert_formatted(&self, text: &str) {
        info!(message = %text, "alert");
    }

    fn alert_signal(&self, text: &str) {
        info!(message = %text, "signal alert");
    }
}

#[derive(Clone)]
pub struct TelegramNotifier {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: i64,
    muted: AtomicBool,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            inner: Arc::new(Inner {
                client: reqwest::Client::new(),
                api_base: API_BASE.to_string(),
                token: token.into(),
                chat_id,
                muted: AtomicBool::new(false),
            }),
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.inner.chat_id
    }

    pub fn muted(&self) -> bool {
        self.inner.muted.load(Ordering::Relaxed)
    }

    /// Flips the mute flag and returns the new state.
    pub fn toggle_muted(&self) -> bool {
        !self.inner.muted.fetch_xor(true, Ordering::Relaxed)
    }

    fn spawn_send(&self, text: String, markdown: bool) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.send(&text, markdown).await {
                warn!(error = %e, "telegram send failed");
            }
        });
    }

    /// Long-polls for new updates past `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let url = format!(
            "{}/bot{}/getUpdates",
            self.inner.api_base, self.inner.token
        );
        let response = self
            .inner
            .client
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StrategyError::TelegramStatus { status, body });
        }
        let updates: UpdatesResponse = response.json().await?;
        Ok(updates.result)
    }
}

impl Inner {
    async fn send(&self, text: &str, markdown: bool) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let mut body = serde_json::json!({ "chat_id": self.chat_id, "text": text });
        if markdown {
            body["parse_mode"] = serde_json::Value::String("Markdown".to_string());
        }
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StrategyError::TelegramStatus { status, body });
        }
        Ok(())
    }
}

impl Alerter for TelegramNotifier {
    fn alert(&self, text: &str) {
        self.spawn_send(text.to_string(), false);
    }

    fn alert_formatted(&self, text: &str) {
        self.spawn_send(text.to_string(), true);
    }

    fn alert_signal(&self, text: &str) {
        if self.muted() {
            debug!(message = %text, "signal alert suppressed while muted");
            return;
        }
        self.spawn_send(text.to_string(), false);
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatesResponse {
    #[allow(dead_code)]
    pub ok: bool,
    #[serde(default)]
    pub result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// A reply on its way out, with or without markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Plain(String),
    Formatted(String),
}

/// Read-only command dispatch over store, ledger, and position state.
pub struct CommandHandler {
    store: Arc<TradeStore>,
    ledger: Arc<BalanceLedger>,
    snapshot: Arc<RwLock<PositionSnapshot>>,
    instance: String,
    interval: Interval,
    symbol_count: usize,
    trailing_drop: f64,
}

impl CommandHandler {
    pub fn new(
        store: Arc<TradeStore>,
        ledger: Arc<BalanceLedger>,
        snapshot: Arc<RwLock<PositionSnapshot>>,
        instance: String,
        interval: Interval,
        symbol_count: usize,
        trailing_drop: f64,
    ) -> Self {
        Self {
            store,
            ledger,
            snapshot,
            instance,
            interval,
            symbol_count,
            trailing_drop,
        }
    }

    /// Replies for one command, or `None` for anything unrecognized.
    /// Store failures degrade to an "unavailable" reply so the chat stays
    /// responsive while the database is down.
    pub fn replies(&self, command: &str, muted: bool) -> Option<Vec<Reply>> {
        match command {
            "/status" => Some(vec![Reply::Plain(self.status(muted))]),
            "/partial" => Some(self.partial()),
            "/results" => Some(self.results()),
            "/trailing" => Some(vec![Reply::Plain(self.trailing())]),
            "/balances" => Some(vec![Reply::Plain(self.ledger.summary())]),
            _ => None,
        }
    }

    fn status(&self, muted: bool) -> String {
        let snapshot = self.snapshot.read().clone();
        let position = match &snapshot.symbol {
            Some(symbol) => format!(
                "LONG {} @ {:.8}, last {}, {:+.2}%",
                symbol,
                snapshot.buy_price,
                snapshot.last_price,
                (snapshot.unrealized - 1.0) * 100.0,
            ),
            None => "FLAT".to_string(),
        };
        let trailing = if snapshot.trailing_armed {
            format!("armed, max {:.8}", snapshot.max_price_seen)
        } else {
            "off".to_string()
        };
        format!(
            "{} tracking {} symbols on {}\nposition: {}\ntrailing: {}\nsignal alerts: {}",
            self.instance,
            self.symbol_count,
            self.interval,
            position,
            trailing,
            if muted { "muted" } else { "on" },
        )
    }

    fn partial(&self) -> Vec<Reply> {
        let trades = match self.store.open_trades() {
            Ok(trades) => trades,
            Err(e) => {
                warn!(error = %e, "open trades unavailable for /partial");
                return vec![Reply::Plain("trade storage unavailable".to_string())];
            }
        };
        if trades.is_empty() {
            return vec![Reply::Plain("no open positions".to_string())];
        }
        trades
            .iter()
            .map(|trade| Reply::Formatted(code_block(&trade.summary())))
            .collect()
    }

    fn results(&self) -> Vec<Reply> {
        let trades = match self.store.closed_trades() {
            Ok(trades) => trades,
            Err(e) => {
                warn!(error = %e, "closed trades unavailable for /results");
                return vec![Reply::Plain("trade storage unavailable".to_string())];
            }
        };
        if trades.is_empty() {
            return vec![Reply::Plain("no closed trades yet".to_string())];
        }
        let mut replies = Vec::new();
        let mut current = String::new();
        for trade in &trades {
            if trade.symbol != current {
                current = trade.symbol.clone();
                replies.push(Reply::Plain(format!("SYMBOL.: {current}:")));
            }
            replies.push(Reply::Formatted(code_block(&trade.summary())));
        }
        replies.push(Reply::Plain(format!(
            "RESULT: {:.2}%",
            compound_return(&trades)
        )));
        replies
    }

    fn trailing(&self) -> String {
        let snapshot = self.snapshot.read().clone();
        match &snapshot.symbol {
            None => "no open position".to_string(),
            Some(symbol) if snapshot.trailing_armed => format!(
                "{}: trailing armed, max {:.8}, stop at {:.8}",
                symbol,
                snapshot.max_price_seen,
                snapshot.max_price_seen * self.trailing_drop,
            ),
            Some(symbol) => format!(
                "{}: trailing not armed, unrealized {:+.2}%",
                symbol,
                (snapshot.unrealized - 1.0) * 100.0,
            ),
        }
    }
}

/// Wraps a trade block in a fenced code span so the underscores in the
/// field labels survive markdown rendering.
pub(crate) fn code_block(text: &str) -> String {
    format!("```\n{text}```")
}

/// Long-poll loop dispatching operator commands until the process exits.
pub async fn run_commands(
    notifier: TelegramNotifier,
    handler: CommandHandler,
    poll_timeout_secs: u64,
) {
    let mut offset: i64 = 0;
    loop {
        let updates = match notifier.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };
        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            if message.chat.id != notifier.chat_id() {
                debug!(chat = message.chat.id, "ignoring message from foreign chat");
                continue;
            }
            let Some(text) = message.text else {
                continue;
            };
            dispatch(&notifier, &handler, text.trim());
        }
    }
}

fn dispatch(notifier: &TelegramNotifier, handler: &CommandHandler, command: &str) {
    if command == "/notify" {
        let muted = notifier.toggle_muted();
        info!(muted, "notification toggle");
        notifier.alert(if muted {
            "signal alerts muted"
        } else {
            "signal alerts unmuted"
        });
        return;
    }
    match handler.replies(command, notifier.muted()) {
        Some(replies) => {
            for reply in replies {
                match reply {
                    Reply::Plain(text) => notifier.alert(&text),
                    Reply::Formatted(text) => notifier.alert_formatted(&text),
                }
            }
        }
        None => debug!(command, "unrecognized command"),
    }
}

/// Test sink capturing everything handed to it.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingAlerter {
    plain: parking_lot::Mutex<Vec<String>>,
    formatted: parking_lot::Mutex<Vec<String>>,
    signal: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingAlerter {
    pub fn plain(&self) -> Vec<String> {
        self.plain.lock().clone()
    }

    pub fn formatted(&self) -> Vec<String> {
        self.formatted.lock().clone()
    }

    pub fn signals(&self) -> Vec<String> {
        self.signal.lock().clone()
    }
}

#[cfg(test)]
impl Alerter for RecordingAlerter {
    fn alert(&self, text: &str) {
        self.plain.lock().push(text.to_string());
    }

    fn alert_formatted(&self, text: &str) {
        self.formatted.lock().push(text.to_string());
    }

    fn alert_signal(&self, text: &str) {
        self.signal.lock().push(text.to_string());
    }
}
