//! HTTP endpoint handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::{sync::Arc, time::SystemTime};
use tracing::{info, warn};

use crate::{
    config::SystemConfig,
    deployment::DeploymentService,
    http::responses::*,
    logging, metrics,
    types::Error,
    webhook::{EventFilter, FilterDecision, IgnoreReason, RejectReason, WebhookHeaders},
};

/// Application state shared across handlers
pub struct AppState {
    pub config: SystemConfig,
    pub filter: EventFilter,
    pub deployments: Arc<DeploymentService>,
    pub start_time: SystemTime,
}

impl AppState {
    pub fn new(
        config: SystemConfig,
        filter: EventFilter,
        deployments: Arc<DeploymentService>,
    ) -> Self {
        Self {
            config,
            filter,
            deployments,
            start_time: SystemTime::now(),
        }
    }
}

/// POST /webhook - GitHub release deliveries
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers = WebhookHeaders::from_header_map(&headers);
    let span = logging::delivery_span(&headers.event, headers.delivery.as_deref());
    span.in_scope(|| process_webhook(&state, &headers, &body))
}

fn process_webhook(state: &AppState, headers: &WebhookHeaders, body: &[u8]) -> Response {
    info!(body_bytes = body.len(), "Webhook received");

    let decision = state.filter.evaluate(headers, body);
    let mut outcome = decision.outcome();

    let response = match decision {
        FilterDecision::Accept(request) => {
            let version = request.version.clone();
            match state.deployments.enqueue(request) {
                Ok(()) => {
                    info!(
                        version = %version,
                        queue_size = state.deployments.queue_size(),
                        "Release accepted, deployment queued"
                    );
                    (
                        StatusCode::OK,
                        format!("Deployment triggered for version: {}\n", version),
                    )
                        .into_response()
                }
                Err(e) => {
                    outcome = match e {
                        Error::QueueFull { .. } => "queue_full",
                        _ => "error",
                    };
                    warn!(version = %version, error = %e, "Could not queue deployment");
                    e.into_response()
                }
            }
        }
        FilterDecision::Ignore(reason) => {
            info!(reason = %reason, "Webhook ignored");
            (StatusCode::OK, ignore_message(&reason)).into_response()
        }
        FilterDecision::Reject(reason) => {
            match &reason {
                RejectReason::InvalidSignature(check) => {
                    warn!(check = ?check, "Webhook rejected: invalid signature");
                }
                RejectReason::MalformedPayload(detail) => {
                    warn!(detail = %detail, "Webhook rejected: malformed payload");
                }
                RejectReason::MissingVersion => {
                    warn!("Webhook rejected: release has no tag name");
                }
            }
            rejection_error(reason).into_response()
        }
    };

    metrics::record_webhook_event(&headers.event, outcome);
    response
}

fn ignore_message(reason: &IgnoreReason) -> String {
    match reason {
        IgnoreReason::NonReleaseEvent(event) if event.is_empty() => {
            "Event type (none) ignored\n".to_string()
        }
        IgnoreReason::NonReleaseEvent(event) => format!("Event type {} ignored\n", event),
        IgnoreReason::Action(action) => format!("Action {} ignored\n", action),
        IgnoreReason::Draft => "Draft release ignored\n".to_string(),
        IgnoreReason::Prerelease => "Prerelease ignored\n".to_string(),
    }
}

fn rejection_error(reason: RejectReason) -> Error {
    match reason {
        RejectReason::InvalidSignature(_) => Error::Authentication(reason.to_string()),
        RejectReason::MalformedPayload(detail) => Error::Validation {
            field: "payload".to_string(),
            message: format!("invalid JSON: {}", detail),
        },
        RejectReason::MissingVersion => Error::Validation {
            field: "release.tag_name".to_string(),
            message: "missing version".to_string(),
        },
    }
}

/// GET /health - Liveness and queue overview
pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime_seconds = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        queue_size: state.deployments.queue_size(),
        current_deployment: state.deployments.snapshot(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
    })
}

/// GET /status - The current or most recent deployment
pub async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse::from(state.deployments.snapshot()))
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn handle_metrics() -> Result<impl IntoResponse, StatusCode> {
    match metrics::gather_metrics() {
        Ok(metrics_text) => Ok((
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            metrics_text,
        )),
        Err(e) => {
            warn!(error = %e, "Failed to gather Prometheus metrics");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Fallback for unknown routes
pub async fn handle_not_found(uri: Uri) -> impl IntoResponse {
    let details = BTreeMap::from([("path".to_string(), uri.path().to_string())]);
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Endpoint not found", "NOT_FOUND").with_details(details)),
    )
}
