//! Per-connection socket loops.

use std::sync::Arc;

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, StreamExt},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use wicket_protocol::Envelope;

use crate::{mux, state::GatewayState};

/// Runs for the lifetime of one admitted connection.
///
/// Splits the socket into a write task fed by the registry's sender and a
/// read loop that tags each frame and forwards it to the engine in arrival
/// order. Either a transport close or a cancellation (revocation, gateway
/// shutdown) ends both; the registry entry is removed immediately.
pub async fn handle_connection(
    socket: WebSocket,
    state: Arc<GatewayState>,
    access_request_id: Option<String>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();
    let cancel = state.shutdown.child_token();

    let conn_id = state
        .registry
        .register(frame_tx, cancel.clone(), access_request_id)
        .await;
    info!(conn = %conn_id, "client connected");

    let write_cancel = cancel.clone();
    let write_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = write_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                },
                frame = frame_rx.recv() => match frame {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    },
                    None => break,
                },
            }
        }
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Envelope>(text.as_str()) {
                        Ok(mut frame) => {
                            mux::tag_outbound(conn_id, &mut frame);
                            state.services.engine.submit(frame).await;
                        },
                        Err(e) => {
                            warn!(conn = %conn_id, error = %e, "dropping malformed frame");
                        },
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                // Pings and pongs are handled by axum; binary is not part
                // of the protocol.
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    debug!(conn = %conn_id, error = %e, "socket read error");
                    break;
                },
            },
        }
    }

    state.registry.unregister(conn_id).await;
    write_task.abort();
    info!(conn = %conn_id, "client disconnected");
}
