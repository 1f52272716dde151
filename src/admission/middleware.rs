//! Admission middleware for relayed routes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::admission::gate::AdmissionGate;
use crate::observability::metrics;

/// Middleware that holds an admission slot for the duration of the request.
///
/// When this request saturates the gate, the caller is throttled with a
/// randomized delay before the handler runs. The slot stays held through the
/// delay and the handler, and is released when the guard drops.
pub async fn admission_middleware(
    State(gate): State<Arc<AdmissionGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (slot, saturated) = gate.acquire().await;

    if saturated {
        let delay = gate.backoff_delay();
        tracing::warn!(
            held = gate.held(),
            capacity = gate.capacity(),
            delay = ?delay,
            "admission gate saturated, backing off"
        );
        metrics::record_backoff();
        tokio::time::sleep(delay).await;
    }

    let _slot = slot;
    next.run(request).await
}
