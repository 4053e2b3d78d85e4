//! Analytics WebSocket broadcast
//!
//! Serves `/ws/analytics` on the analytics port. A connecting client first
//! receives a snapshot of the most recent event per type, then a stream of
//! `{ "<event_type>": <payload> }` messages. Clients never send.

use futures_util::{SinkExt, StreamExt};
use noesis_core::Runtime;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

pub async fn run(runtime: Arc<Runtime>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", runtime.config.host, runtime.config.analytics_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("analytics stream listening on ws://{}/ws/analytics", addr);

    while let Ok((stream, peer)) = listener.accept().await {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            let check_path = |request: &Request, response: Response| {
                if request.uri().path() == "/ws/analytics" {
                    Ok(response)
                } else {
                    Err(ErrorResponse::new(Some("not found".to_string())))
                }
            };
            match tokio_tungstenite::accept_hdr_async(stream, check_path).await {
                Ok(ws_stream) => handle_connection(ws_stream, runtime).await,
                Err(e) => debug!("analytics handshake from {} failed: {}", peer, e),
            }
        });
    }

    Ok(())
}

async fn handle_connection(
    ws_stream: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    runtime: Arc<Runtime>,
) {
    let (mut sender, mut receiver) = ws_stream.split();
    let (mut events, snapshot) = runtime.analytics.subscribe();

    // The latest event per type, sent once on connect.
    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
        Err(e) => warn!("failed to serialize the analytics snapshot: {}", e),
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(json) = serde_json::to_string(&event.to_message()) else {
                    continue;
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    // Clients may not send; drain control frames, drop the
                    // connection when it closes or errors.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!("analytics client disconnected");
}
