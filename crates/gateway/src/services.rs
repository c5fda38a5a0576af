use std::sync::Arc;

use {
    async_trait::async_trait,
    tokio::sync::{Mutex, mpsc},
};

use wicket_protocol::Envelope;

// ── Engine seam ──────────────────────────────────────────────────────────────

/// The shared backend engine, as the gateway sees it.
///
/// The gateway feeds tagged request frames in through [`submit`] and reads
/// everything the engine emits (responses, events, errors) from the channel
/// handed out by [`subscribe`]. The engine's behavior is opaque here.
///
/// [`submit`]: EngineService::submit
/// [`subscribe`]: EngineService::subscribe
#[async_trait]
pub trait EngineService: Send + Sync {
    /// Hand out the receiving end of the engine's output stream.
    /// The gateway calls this exactly once, at startup.
    async fn subscribe(&self) -> mpsc::UnboundedReceiver<Envelope>;

    /// Feed one tagged client frame into the engine.
    async fn submit(&self, frame: Envelope);

    /// Shut the engine down. Implementations wrapping an engine owned by
    /// the caller may leave it running.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Services injected into the gateway at startup.
pub struct GatewayServices {
    pub engine: Arc<dyn EngineService>,
}

impl GatewayServices {
    pub fn new(engine: Arc<dyn EngineService>) -> Self {
        Self { engine }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopEngine::default()))
    }
}

// ── Engine implementations ───────────────────────────────────────────────────

type Outbox = Mutex<Option<mpsc::UnboundedSender<Envelope>>>;

/// Engine that swallows input and never emits.
#[derive(Default)]
pub struct NoopEngine {
    // Held so the subscriber's channel stays open for the gateway's lifetime.
    outbox: Outbox,
}

#[async_trait]
impl EngineService for NoopEngine {
    async fn subscribe(&self) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbox.lock().await = Some(tx);
        rx
    }

    async fn submit(&self, _frame: Envelope) {}

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Engine that answers every tagged request with a response frame echoing
/// the request, and re-emits untagged frames as broadcast events. Used by
/// the CLI's demo mode and the integration tests.
#[derive(Default)]
pub struct EchoEngine {
    outbox: Outbox,
}

impl EchoEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EngineService for EchoEngine {
    async fn subscribe(&self) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbox.lock().await = Some(tx);
        rx
    }

    async fn submit(&self, frame: Envelope) {
        let reply = if frame.request_id.is_some() {
            let mut reply = Envelope::new("response")
                .with_field("echo", serde_json::Value::String(frame.kind.clone()));
            reply.request_id = frame.request_id;
            reply.rest.extend(frame.rest);
            reply
        } else {
            // No correlation id: treat it as an event and re-emit untagged.
            frame
        };

        if let Some(tx) = self.outbox.lock().await.as_ref() {
            let _ = tx.send(reply);
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
