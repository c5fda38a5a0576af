//! Multiplexes many client connections onto the single shared engine.
//!
//! Outbound, each request id is rewritten to embed the owning connection's
//! id; inbound, the embedding is stripped so every engine frame reaches
//! exactly one connection with the client's original id restored. Frames
//! without a request id are events and broadcast to everyone.

use tracing::{debug, warn};

use wicket_protocol::{ConnId, Envelope, TaggedRequestId};

use crate::registry::ConnectionRegistry;

/// Rewrite a client frame's request id before it goes to the engine.
///
/// Frames without a request id (or with an empty one) pass through
/// unchanged: they carry no reply correlation.
pub fn tag_outbound(conn_id: ConnId, frame: &mut Envelope) {
    if let Some(original) = frame.request_id.take() {
        if original.is_empty() {
            frame.request_id = Some(original);
        } else {
            frame.request_id = Some(TaggedRequestId::new(conn_id, original).encode());
        }
    }
}

/// Route one engine frame back out.
///
/// Tagged frames go to the owning connection with the original id restored;
/// a vanished or unparsable owner means the frame is dropped, not an error
/// (the client already disconnected). Untagged frames are broadcast to the
/// registry snapshot taken now.
pub async fn deliver(registry: &ConnectionRegistry, mut frame: Envelope) {
    let Some(raw) = frame.request_id.take() else {
        let Some(text) = serialize(&frame) else { return };
        registry.broadcast(&text).await;
        return;
    };

    let Some(TaggedRequestId { conn, original }) = TaggedRequestId::parse(&raw) else {
        debug!(request_id = %raw, "dropping engine frame with unroutable request id");
        return;
    };

    frame.request_id = Some(original);
    let Some(text) = serialize(&frame) else { return };
    if !registry.send_to(conn, &text).await {
        debug!(conn = %conn, "dropping engine frame for closed connection");
    }
}

fn serialize(frame: &Envelope) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, kind = %frame.kind, "failed to serialize engine frame");
            None
        },
    }
}
