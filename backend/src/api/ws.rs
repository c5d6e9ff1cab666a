// =============================================================================
// WebSocket Handler — Push-based portfolio updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. The latest portfolio view immediately (if the portfolio has loaded).
//   2. One message per store update after that.
//
// Every message carries the rows already converted to the display currency
// that was active when the update was published.
//
// The handler also answers Ping frames and keeps the shared client counter
// on AppState current.
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::portfolio::currency::Currency;
use crate::portfolio::store::PortfolioUpdate;
use crate::types::Stock;

// =============================================================================
// Outbound message
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PortfolioMessage {
    pub seq: u64,
    pub version: u64,
    pub currency: Currency,
    pub stocks: Vec<Stock>,
}

impl PortfolioMessage {
    pub fn from_update(update: &PortfolioUpdate, seq: u64) -> Self {
        Self {
            seq,
            version: update.version,
            currency: update.currency,
            stocks: update.converted(),
        }
    }
}

// =============================================================================
// WebSocket upgrade handler
// =============================================================================

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

// =============================================================================
// Connection handler
// =============================================================================

/// Runs two concurrent branches via `tokio::select!`:
///   1. **Push**: forward every store update to the client.
///   2. **Recv**: process incoming client frames (Ping, Close).
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before reading `latest` so no update slips between the two.
    let mut updates = state.store.subscribe();
    state.ws_clients.fetch_add(1, Ordering::Relaxed);
    state.increment_version();

    let (mut sender, mut receiver) = socket.split();
    let mut sequence: u64 = 0;
    let mut last_sent_version: u64 = 0;

    if let Some(update) = state.store.latest() {
        if let Err(e) = send_update(&mut sender, &state, &update, &mut sequence).await {
            warn!(error = %e, "Failed to send initial WebSocket snapshot");
            cleanup(&state);
            return;
        }
        last_sent_version = update.version;
    }

    loop {
        tokio::select! {
            // ── Push: forward store updates ─────────────────────────────
            update = updates.next_update() => {
                let Some(update) = update else {
                    info!("portfolio stream closed — disconnecting");
                    break;
                };
                if update.version <= last_sent_version {
                    continue;
                }
                if let Err(e) = send_update(&mut sender, &state, &update, &mut sequence).await {
                    debug!(error = %e, "WebSocket send failed — disconnecting");
                    break;
                }
                last_sent_version = update.version;
            }

            // ── Recv: process incoming messages ────────────────────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        debug!("WebSocket Ping received — sending Pong");
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "Failed to send Pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket Close frame received — disconnecting");
                        break;
                    }
                    Some(Ok(_)) => {
                        debug!("WebSocket client message ignored");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended (None)");
                        break;
                    }
                }
            }
        }
    }

    cleanup(&state);
}

// =============================================================================
// Helpers
// =============================================================================

async fn send_update<S>(
    sender: &mut S,
    state: &Arc<AppState>,
    update: &PortfolioUpdate,
    sequence: &mut u64,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    state.ws_sequence_number.fetch_add(1, Ordering::Relaxed);
    *sequence += 1;

    let message = PortfolioMessage::from_update(update, *sequence);

    match serde_json::to_string(&message) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            debug!(version = update.version, seq = *sequence, "WebSocket update sent");
            Ok(())
        }
        Err(e) => {
            // Serialisation errors are not network errors; don't disconnect.
            warn!(error = %e, "Failed to serialize portfolio update");
            Ok(())
        }
    }
}

fn cleanup(state: &Arc<AppState>) {
    state.ws_clients.fetch_sub(1, Ordering::Relaxed);
    state.increment_version();
    info!("WebSocket connection closed — cleanup complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_applies_update_currency() {
        let update = PortfolioUpdate {
            version: 4,
            currency: Currency::Gbp,
            stocks: Arc::new(vec![Stock {
                symbol: "AAPL".into(),
                name: "Apple".into(),
                price: 100.0,
                day_change: 2.0,
                change_pct: 2.0,
                volume: 1.0,
                volume_avg: 1.0,
                market_cap: 1.0,
                pe: None,
                intraday: vec![100.0],
            }]),
        };
        let msg = PortfolioMessage::from_update(&update, 9);
        assert_eq!(msg.seq, 9);
        assert_eq!(msg.version, 4);
        assert_eq!(msg.stocks[0].price, 77.0);
        assert_eq!(msg.stocks[0].day_change, 2.0);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["currency"], "GBP");
    }
}
