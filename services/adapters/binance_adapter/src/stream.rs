//! Combined-stream websocket driver
//!
//! One driver task owns the socket. Subscribers talk to it over a command
//! channel and receive decoded events on their own unbounded channel, so a
//! slow consumer can never stall the socket read loop. When the connection
//! drops the driver reconnects after a fixed delay and replays SUBSCRIBE
//! frames for every key that still has a listener.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use market::StreamEvent;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::config::BinanceConfig;
use crate::error::{AdapterError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Handle to the shared websocket driver.
///
/// Cloning is cheap and every clone feeds the same socket. Dropping the
/// last clone stops the driver once its current session ends.
#[derive(Clone)]
pub struct KlineStream {
    commands: UnboundedSender<Command>,
}

enum Command {
    Subscribe {
        key: String,
        tx: UnboundedSender<StreamEvent>,
    },
    Unsubscribe {
        key: String,
    },
}

impl KlineStream {
    /// Spawns the driver task, which connects immediately and keeps
    /// reconnecting until the handle is dropped.
    pub fn spawn(config: BinanceConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(config, rx));
        (Self { commands: tx }, handle)
    }

    /// Subscribes to a stream key such as `solusdt@kline_15m` or
    /// `!balance@arr` and returns the receiving end of the fan-out.
    pub fn subscribe(&self, key: impl Into<String>) -> Result<UnboundedReceiver<StreamEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.commands
            .send(Command::Subscribe { key: key.into(), tx })
            .map_err(|_| AdapterError::DriverGone)?;
        Ok(rx)
    }

    /// Drops every subscriber of a key and ends the upstream subscription.
    pub fn unsubscribe(&self, key: impl Into<String>) -> Result<()> {
        self.commands
            .send(Command::Unsubscribe { key: key.into() })
            .map_err(|_| AdapterError::DriverGone)
    }
}

async fn run(config: BinanceConfig, mut commands: UnboundedReceiver<Command>) {
    let mut registry = Registry::default();
    let mut next_id: u64 = 0;
    loop {
        // Absorb subscription changes that arrived while disconnected so
        // the resubscribe on the next session covers them.
        loop {
            match commands.try_recv() {
                Ok(command) => registry.apply_offline(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("all stream handles dropped, stopping driver");
                    return;
                }
            }
        }

        match connect(&config).await {
            Ok(ws) => {
                info!(endpoint = %config.ws_endpoint, "websocket connected");
                match session(ws, &config, &mut registry, &mut commands, &mut next_id).await {
                    Ok(SessionEnd::HandleClosed) => {
                        info!("all stream handles dropped, stopping driver");
                        return;
                    }
                    Ok(SessionEnd::Disconnected) => {
                        warn!("websocket closed by peer, reconnecting");
                    }
                    Err(e) => {
                        warn!(error = %e, "websocket session failed, reconnecting");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "websocket connect failed, retrying");
            }
        }
        tokio::time::sleep(Duration::from_millis(config.reconnect_delay_ms)).await;
    }
}

async fn connect(config: &BinanceConfig) -> Result<WsStream> {
    let timeout = Duration::from_millis(config.connection_timeout_ms);
    match tokio::time::timeout(timeout, connect_async(&config.ws_endpoint)).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(AdapterError::ConnectTimeout {
            url: config.ws_endpoint.clone(),
            timeout_ms: config.connection_timeout_ms,
        }),
    }
}

enum SessionEnd {
    /// Every handle clone is gone; the driver should exit.
    HandleClosed,
    /// The peer ended the connection; the driver should reconnect.
    Disconnected,
}

async fn session(
    ws: WsStream,
    config: &BinanceConfig,
    registry: &mut Registry,
    commands: &mut UnboundedReceiver<Command>,
    next_id: &mut u64,
) -> Result<SessionEnd> {
    let (mut sink, mut source) = ws.split();

    let active = registry.keys();
    if !active.is_empty() {
        debug!(count = active.len(), "resubscribing active streams");
        send_control(&mut sink, "SUBSCRIBE", &active, next_id).await?;
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Subscribe { key, tx }) => {
                    if registry.add(key.clone(), tx) {
                        info!(stream = %key, "subscribing");
                        send_control(&mut sink, "SUBSCRIBE", &[key], next_id).await?;
                    }
                }
                Some(Command::Unsubscribe { key }) => {
                    if registry.remove(&key) {
                        info!(stream = %key, "unsubscribing");
                        send_control(&mut sink, "UNSUBSCRIBE", &[key], next_id).await?;
                    }
                }
                None => return Ok(SessionEnd::HandleClosed),
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&text, config, registry, &mut sink, next_id).await?;
                }
                Some(Ok(Message::Ping(payload))) => {
                    sink.send(Message::Pong(payload)).await?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Disconnected),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }
}

async fn handle_frame(
    text: &str,
    config: &BinanceConfig,
    registry: &mut Registry,
    sink: &mut WsSink,
    next_id: &mut u64,
) -> Result<()> {
    match StreamEvent::decode(text) {
        Ok(Some(event)) => {
            let key = event_key(&event, &config.balance_stream);
            if registry.route(&key, &event) {
                info!(stream = %key, "last listener gone, unsubscribing");
                send_control(sink, "UNSUBSCRIBE", &[key], next_id).await?;
            }
        }
        Ok(None) => trace!("subscription ack"),
        Err(e) => warn!(error = %e, "dropping undecodable frame"),
    }
    Ok(())
}

fn event_key(event: &StreamEvent, balance_stream: &str) -> String {
    match event {
        StreamEvent::Kline(kline) => market::stream_key(&kline.symbol, kline.interval),
        StreamEvent::Balance(_) => balance_stream.to_string(),
    }
}

async fn send_control(
    sink: &mut WsSink,
    method: &str,
    params: &[String],
    next_id: &mut u64,
) -> Result<()> {
    *next_id += 1;
    sink.send(Message::Text(control_frame(method, params, *next_id)))
        .await?;
    Ok(())
}

fn control_frame(method: &str, params: &[String], id: u64) -> String {
    serde_json::json!({
        "method": method,
        "params": params,
        "id": id,
    })
    .to_string()
}

/// Fan-out table from stream key to live subscribers.
#[derive(Default)]
struct Registry {
    subscribers: HashMap<String, Vec<UnboundedSender<StreamEvent>>>,
}

impl Registry {
    /// Adds a subscriber. True when the key had none before and therefore
    /// needs an upstream SUBSCRIBE.
    fn add(&mut self, key: String, tx: UnboundedSender<StreamEvent>) -> bool {
        let entry = self.subscribers.entry(key).or_default();
        entry.push(tx);
        entry.len() == 1
    }

    /// Drops a key outright. True when it was present.
    fn remove(&mut self, key: &str) -> bool {
        self.subscribers.remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.subscribers.keys().cloned().collect()
    }

    /// Delivers an event to the key's subscribers, pruning any whose
    /// receiver was dropped. True when the key ends up with no subscribers
    /// and should be unsubscribed upstream.
    fn route(&mut self, key: &str, event: &StreamEvent) -> bool {
        let Some(subscribers) = self.subscribers.get_mut(key) else {
            return false;
        };
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            self.subscribers.remove(key);
            true
        } else {
            false
        }
    }

    fn apply_offline(&mut self, command: Command) {
        match command {
            Command::Subscribe { key, tx } => {
                self.add(key, tx);
            }
            Command::Unsubscribe { key } => {
                self.remove(&key);
            }
        }
    }
}
