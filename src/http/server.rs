//! HTTP server setup and request coordination.
//!
//! # Responsibilities
//! - Create the Axum router with the relay and health handlers
//! - Wire up middleware (admission gate, timeout, request ID, tracing)
//! - Race each relay call against its deadline
//! - Serve with graceful shutdown and a bounded drain window

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::admission::{admission_middleware, AdmissionGate};
use crate::config::RelayConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::relay::{RelayError, UpstreamRelay};

/// Error type for server construction and serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid upstream URL: {0}")]
    UpstreamUrl(#[from] url::ParseError),

    #[error("failed to build upstream client: {0}")]
    Client(#[source] RelayError),

    /// In-flight requests outlived the shutdown grace period. Treated as
    /// fatal by the caller, never swallowed.
    #[error("graceful drain did not finish within {grace:?}")]
    DrainTimeout { grace: Duration },
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    pub relay: Arc<UpstreamRelay>,
    pub deadline: Duration,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let url = Url::parse(&config.upstream.url)?;
        let relay = Arc::new(UpstreamRelay::new(url).map_err(ServerError::Client)?);
        let gate = Arc::new(AdmissionGate::new(
            config.admission.max_in_flight,
            Duration::from_secs(config.admission.backoff_min_secs),
            Duration::from_secs(config.admission.backoff_max_secs),
        ));

        let state = AppState {
            gate,
            relay,
            deadline: Duration::from_secs(config.upstream.deadline_secs),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The health route is registered after the admission and timeout layers
    /// so liveness checks never queue behind saturated relay traffic.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let gate = state.gate.clone();

        // Whole-request safety net, strictly above the relay deadline plus
        // the worst-case back-off so the coordinator's own race decides the
        // visible outcome.
        let safety_net = state.deadline
            + Duration::from_secs(config.admission.backoff_max_secs)
            + Duration::from_secs(1);

        Router::new()
            .route("/", get(relay_handler))
            .route_layer(middleware::from_fn_with_state(gate, admission_middleware))
            .route_layer(TimeoutLayer::new(safety_net))
            .route("/healthz", get(health_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the listener fails or shutdown is triggered.
    ///
    /// On shutdown the listener stops accepting, keep-alive connections are
    /// closed, and in-flight requests get the configured grace period to
    /// finish. Overrunning the grace period is an error, not a silent exit.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let grace = Duration::from_secs(self.config.shutdown.grace_secs);

        let mut drain = shutdown.subscribe();
        let server = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = drain.recv().await;
            })
            .into_future();

        let mut draining = shutdown.subscribe();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                // Listener ended without a shutdown being requested.
                result?;
                Ok(())
            }
            _ = draining.recv() => {
                tracing::info!(grace = ?grace, "shutting down, draining in-flight requests");
                match tokio::time::timeout(grace, &mut server).await {
                    Ok(result) => {
                        result?;
                        tracing::info!("HTTP server stopped");
                        Ok(())
                    }
                    Err(_) => Err(ServerError::DrainTimeout { grace }),
                }
            }
        }
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Relay coordinator.
///
/// Spawns the upstream call as its own task and races it against the
/// deadline. The first of the two to finish decides the response; the loser
/// is aborted or its result discarded. Exactly one response is written and
/// exactly one terminal log line emitted per request.
async fn relay_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        url = %state.relay.url(),
        "relaying request"
    );

    let relay = state.relay.clone();
    let deadline = state.deadline;
    let mut call = tokio::spawn(async move { relay.fetch(deadline).await });

    tokio::select! {
        // Deterministic winner when both sides are ready at the deadline:
        // the timeout branch is checked first.
        biased;

        _ = tokio::time::sleep(deadline) => {
            // Deadline won: abort the relay so the outbound call is cancelled
            // and a late result cannot race this response.
            call.abort();
            tracing::error!(
                request_id = %request_id,
                elapsed = ?start.elapsed(),
                "upstream deadline exceeded"
            );
            metrics::record_relay("timeout", start);
            (StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout").into_response()
        }
        result = &mut call => match result {
            Ok(Ok(records)) => {
                tracing::info!(
                    request_id = %request_id,
                    elapsed = ?start.elapsed(),
                    records = records.len(),
                    "relay complete"
                );
                metrics::record_relay("success", start);
                (StatusCode::OK, Json(records)).into_response()
            }
            Ok(Err(err)) => {
                tracing::error!(
                    request_id = %request_id,
                    elapsed = ?start.elapsed(),
                    error = %err,
                    "relay failed"
                );
                metrics::record_relay("upstream_error", start);
                (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
            }
            Err(err) => {
                tracing::error!(
                    request_id = %request_id,
                    elapsed = ?start.elapsed(),
                    error = %err,
                    "relay task failed"
                );
                metrics::record_relay("internal_error", start);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// Liveness probe. Bypasses the admission gate and the relay entirely.
async fn health_handler() -> &'static str {
    "ok"
}
