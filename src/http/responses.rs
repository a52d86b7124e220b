//! HTTP response types
//!
//! `/health` and `/status` answer with JSON. Webhook outcomes, including
//! errors, are a single line of plain text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{DeploymentRecord, Error};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub queue_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_deployment: Option<DeploymentRecord>,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// Body of `GET /status`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatusResponse {
    Deployment(DeploymentRecord),
    NoDeployment { status: &'static str },
}

impl From<Option<DeploymentRecord>> for StatusResponse {
    fn from(record: Option<DeploymentRecord>) -> Self {
        match record {
            Some(record) => StatusResponse::Deployment(record),
            None => StatusResponse::NoDeployment {
                status: "no deployment",
            },
        }
    }
}

/// JSON error body for non-webhook routes
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: BTreeMap<String, String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Convert error types to HTTP status codes
pub fn error_to_status_code(error: &Error) -> StatusCode {
    match error {
        Error::Authentication(_) => StatusCode::UNAUTHORIZED,
        Error::Validation { .. } => StatusCode::BAD_REQUEST,
        Error::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::QueueClosed => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Application(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = error_to_status_code(&self);
        (status_code, format!("{}\n", self)).into_response()
    }
}
