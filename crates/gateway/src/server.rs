use std::sync::Arc;

use {
    axum::{
        Router,
        extract::{Query, State, WebSocketUpgrade},
        http::StatusCode,
        response::{IntoResponse, Json, Response},
        routing::get,
    },
    serde::Deserialize,
    tokio::sync::oneshot,
    tower_http::cors::{Any, CorsLayer},
    tracing::warn,
};

use crate::{
    auth::AdmissionDecision,
    requests::AccessReply,
    state::GatewayState,
    ws::handle_connection,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    gateway: Arc<GatewayState>,
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/demande", get(access_request_handler))
        .route("/ws", get(ws_upgrade_handler))
        .layer(cors)
        .with_state(AppState { gateway: state })
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let count = state.gateway.client_count().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
        "connections": count,
    }))
}

#[derive(Deserialize)]
struct AccessParams {
    id: Option<String>,
}

/// Long-poll admission request.
///
/// Parks the HTTP reply until an operator approves (200 with the
/// `<code>:<id>` credential) or refuses (401), or until the configured TTL
/// expires (408). Duplicate ids are refused up front (409).
async fn access_request_handler(
    Query(params): Query<AccessParams>,
    State(state): State<AppState>,
) -> Response {
    let Some(id) = params.id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing id").into_response();
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if !state.gateway.requests.submit(&id, reply_tx).await {
        return (StatusCode::CONFLICT, "request already pending").into_response();
    }

    let reply = match state.gateway.request_ttl {
        Some(ttl) => match tokio::time::timeout(ttl, reply_rx).await {
            Ok(resolved) => resolved,
            Err(_) => {
                state.gateway.requests.remove(&id).await;
                return (StatusCode::REQUEST_TIMEOUT, "request timed out").into_response();
            },
        },
        None => reply_rx.await,
    };

    match reply {
        Ok(AccessReply::Granted { credential }) => (StatusCode::OK, credential).into_response(),
        Ok(AccessReply::Denied) | Err(_) => {
            (StatusCode::UNAUTHORIZED, "access denied").into_response()
        },
    }
}

#[derive(Deserialize)]
struct UpgradeParams {
    code: Option<String>,
}

/// Admission is decided before the handshake completes: a rejected attempt
/// gets a plain 401 and the socket never upgrades.
async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<UpgradeParams>,
    State(state): State<AppState>,
) -> Response {
    match state.gateway.admission.authorize(params.code.as_deref()).await {
        AdmissionDecision::Rejected { reason } => {
            warn!(reason = reason.as_str(), "connection upgrade rejected");
            (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
        },
        AdmissionDecision::Admitted { access_request_id } => {
            let gateway = Arc::clone(&state.gateway);
            ws.on_upgrade(move |socket| handle_connection(socket, gateway, access_request_id))
                .into_response()
        },
    }
}
