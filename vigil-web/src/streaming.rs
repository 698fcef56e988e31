use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::AppState;
use vigil_core::Alert;

/// Channel capacity for fanning alerts out to subscribers. A subscriber that
/// falls further behind than this starts losing the oldest alerts rather
/// than stalling ingestion.
const BROADCAST_CAPACITY: usize = 1000;

/// Per-subscriber write deadline; a socket that cannot accept a frame within
/// this window is treated as dead and detached.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Central fan-out hub for live alert subscribers.
///
/// Join/leave is a `subscribe()` / receiver-drop pair on a tokio broadcast
/// channel: each send observes a consistent snapshot of the receivers that
/// exist at that moment, later joiners see only later alerts, and one dead
/// receiver never affects delivery to the rest.
#[derive(Clone)]
pub struct AlertHub {
    sender: broadcast::Sender<String>,
    connections: Arc<AtomicUsize>,
}

impl Default for AlertHub {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            sender,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Join the live feed. Dropping the returned receiver leaves it.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    fn connection_opened(&self) -> usize {
        self.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn connection_closed(&self) -> usize {
        self.connections.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    /// Serialize the alert once and push it to every current subscriber.
    ///
    /// Never fails: delivery problems stay inside the hub. Returns how many
    /// subscribers were offered the alert.
    pub fn broadcast(&self, alert: &Alert) -> usize {
        let wire = match serde_json::to_string(alert) {
            Ok(json) => json,
            Err(e) => {
                // serde_json on a plain struct only fails on pathological
                // states; log and drop rather than fail ingestion.
                error!("failed to serialize alert {}: {}", alert.threat_id, e);
                return 0;
            }
        };

        match self.sender.send(wire) {
            Ok(receivers) => {
                debug!(
                    threat_id = %alert.threat_id,
                    receivers, "alert broadcast to live subscribers"
                );
                receivers
            }
            Err(_) => {
                // No one is listening; durable storage already succeeded.
                debug!(threat_id = %alert.threat_id, "no live subscribers for alert");
                0
            }
        }
    }
}

/// WebSocket endpoint for live alert delivery.
pub async fn alert_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_subscriber(socket, state))
}

async fn handle_subscriber(socket: WebSocket, state: AppState) {
    let hub = &state.alert_hub;
    let count = hub.connection_opened();
    info!("alert subscriber connected ({} active)", count);

    let mut feed = hub.subscribe();
    let (mut sink, mut stream) = socket.split();

    tokio::select! {
        // Client-to-server traffic: we only care about close and ping frames.
        _ = async {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Close(_)) => {
                        info!("alert subscriber closed the connection");
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(_) => {}
                    Err(e) => {
                        warn!("alert subscriber socket error: {}", e);
                        break;
                    }
                }
            }
        } => {}

        // Server-to-client fan-out from the hub.
        _ = async {
            loop {
                match feed.recv().await {
                    Ok(wire) => {
                        let send = tokio::time::timeout(
                            SEND_TIMEOUT,
                            sink.send(Message::Text(wire)),
                        );
                        match send.await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                warn!("alert delivery failed, dropping subscriber: {}", e);
                                break;
                            }
                            Err(_) => {
                                warn!("alert delivery timed out, dropping subscriber");
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Slow consumer: it keeps its place in the feed but
                        // the oldest alerts are gone.
                        warn!("alert subscriber lagged, skipped {} alerts", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {}
    }

    let count = hub.connection_closed();
    info!("alert subscriber disconnected ({} active)", count);
}
