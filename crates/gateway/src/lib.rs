//! Gateway: shares one stateful backend engine between many authorized
//! WebSocket clients.
//!
//! Lifecycle:
//! 1. Mint the shared access code
//! 2. Bind, start the HTTP server (long-poll admission requests, health)
//! 3. Attach the WebSocket upgrade handler (admission checked pre-handshake)
//! 4. Route engine output back to connections until shutdown
//!
//! The engine itself is opaque: it lives behind the [`services::EngineService`]
//! seam and is only ever reached through tagged frames.

pub mod auth;
pub mod mux;
pub mod registry;
pub mod requests;
pub mod server;
pub mod services;
pub mod state;
pub mod ws;

use std::{net::SocketAddr, sync::Arc};

use {
    thiserror::Error,
    tokio::{sync::watch, task::JoinHandle},
    tracing::{debug, info, warn},
};

use {
    wicket_config::WicketConfig,
    wicket_protocol::ConnId,
};

use crate::{
    requests::AccessReply,
    services::{EngineService, GatewayServices},
    state::GatewayState,
};

// ── Operator-facing errors ───────────────────────────────────────────────────

/// Failures from the operator control surface.
///
/// Every unknown-id operation reports not-found the same way; none of them
/// is silently absorbed.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no pending access request with id {0:?}")]
    UnknownRequest(String),

    #[error("no connection admitted for access request {0:?}")]
    UnknownConnection(String),

    #[error("failed to mint access code: {0}")]
    Mint(#[source] wicket_codes::CodeError),
}

// ── Gateway handle ───────────────────────────────────────────────────────────

/// A running gateway and its operator control surface.
pub struct Gateway {
    state: Arc<GatewayState>,
    shared_code: String,
    local_addr: SocketAddr,
    server: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl Gateway {
    /// Mint the shared code, bind the listener, start serving, and begin
    /// routing engine output.
    pub async fn start(
        config: WicketConfig,
        engine: Arc<dyn EngineService>,
    ) -> anyhow::Result<Self> {
        let (shared_code, shared_entropy) = wicket_codes::generate()?.into_parts();
        let state = GatewayState::new(
            shared_entropy,
            GatewayServices::new(Arc::clone(&engine)),
            config.access.request_ttl(),
        );

        // One task owns the engine's output stream and does all inbound
        // routing, so deliveries stay sequential.
        let mut engine_rx = engine.subscribe().await;
        let dispatcher = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = state.shutdown.cancelled() => break,
                        frame = engine_rx.recv() => match frame {
                            Some(frame) => mux::deliver(&state.registry, frame).await,
                            None => {
                                debug!("engine output stream closed");
                                break;
                            },
                        },
                    }
                }
            })
        };

        let app = server::build_gateway_app(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind((
            config.gateway.bind.as_str(),
            config.gateway.port,
        ))
        .await?;
        let local_addr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            version = %state.version,
            protocol = wicket_protocol::PROTOCOL_VERSION,
            "gateway listening"
        );

        let shutdown = state.shutdown.clone();
        let server = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = serve.await {
                warn!(error = %e, "gateway server exited with error");
            }
        });

        Ok(Self {
            state,
            shared_code,
            local_addr,
            server,
            dispatcher,
        })
    }

    /// The long-lived shared access code, valid for this gateway's lifetime.
    pub fn shared_code(&self) -> &str {
        &self.shared_code
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Observe pending access-request ids: current snapshot immediately,
    /// then every change. Unsubscribe by dropping the receiver.
    pub fn watch_requests(&self) -> watch::Receiver<Vec<String>> {
        self.state.requests.watch()
    }

    /// Observe admitted connection ids, same contract as [`watch_requests`].
    ///
    /// [`watch_requests`]: Gateway::watch_requests
    pub fn watch_connections(&self) -> watch::Receiver<Vec<ConnId>> {
        self.state.registry.watch()
    }

    /// Approve a pending access request: mint a one-time code, store its
    /// entropy, and resolve the parked long-poll with `"<code>:<id>"`.
    pub async fn approve(&self, request_id: &str) -> Result<(), ControlError> {
        let reply = self
            .state
            .requests
            .take(request_id)
            .await
            .ok_or_else(|| ControlError::UnknownRequest(request_id.to_string()))?;

        let (phrase, entropy) = wicket_codes::generate()
            .map_err(ControlError::Mint)?
            .into_parts();
        self.state.admission.grant(request_id, entropy).await;

        info!(request_id, "access request approved");
        let credential = format!("{phrase}:{request_id}");
        if reply.send(AccessReply::Granted { credential }).is_err() {
            // The code stays valid: the requester may come back for it
            // through another channel.
            warn!(request_id, "approval reply dropped, requester already gone");
        }
        Ok(())
    }

    /// Refuse a pending access request, resolving its long-poll with 401.
    pub async fn refuse(&self, request_id: &str) -> Result<(), ControlError> {
        let reply = self
            .state
            .requests
            .take(request_id)
            .await
            .ok_or_else(|| ControlError::UnknownRequest(request_id.to_string()))?;

        info!(request_id, "access request refused");
        let _ = reply.send(AccessReply::Denied);
        Ok(())
    }

    /// Force-close the connection that was admitted for `request_id`.
    pub async fn revoke(&self, request_id: &str) -> Result<(), ControlError> {
        let conn_id = self
            .state
            .registry
            .revoke_by_access_request(request_id)
            .await?;
        info!(request_id, conn = %conn_id, "access revoked");
        Ok(())
    }

    /// Tear down: close every socket, deny everything still pending, stop
    /// the HTTP server, and shut the engine down.
    pub async fn close(self) -> anyhow::Result<()> {
        info!("gateway shutting down");
        self.state.shutdown.cancel();
        self.state.registry.drain().await;
        self.state.requests.drain().await;
        if let Err(e) = self.server.await {
            debug!(error = %e, "server task join failed");
        }
        if let Err(e) = self.dispatcher.await {
            debug!(error = %e, "dispatcher task join failed");
        }
        self.state.services.engine.close().await
    }
}
