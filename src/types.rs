use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Deployment queue full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("Deployment queue is closed")]
    QueueClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Application error: {0}")]
    Application(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config file parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors raised while invoking the deploy action
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command '{command}' timed out after {timeout}s")]
    Timeout { command: String, timeout: u64 },

    #[error("Command '{command}' could not be started: {source}")]
    StartFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// A release accepted by the webhook filter and waiting for the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    /// Release tag, passed verbatim to the deploy action
    pub version: String,
    /// `owner/name` of the repository that published the release
    pub repository: Option<String>,
}

impl DeploymentRequest {
    pub fn new(version: impl Into<String>, repository: Option<String>) -> Self {
        Self {
            version: version.into(),
            repository,
        }
    }
}

/// Deployment status. `Deploying` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Deploying,
    Success,
    Failed,
}

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeploymentStatus::Deploying)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
        }
    }
}

/// The single current (or most recent) deployment.
///
/// Fields only change through [`DeploymentRecord::succeed`] and
/// [`DeploymentRecord::fail`], which keep the record consistent: a
/// terminal record always has an `end_time` no earlier than `start_time`,
/// and a failed record always carries an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentRecord {
    pub version: String,
    pub status: DeploymentStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl DeploymentRecord {
    /// A fresh record for a deployment that is starting now
    pub fn started(request: &DeploymentRequest) -> Self {
        Self {
            version: request.version.clone(),
            status: DeploymentStatus::Deploying,
            start_time: Utc::now(),
            end_time: None,
            error: None,
            repository: request.repository.clone(),
        }
    }

    pub fn succeed(&mut self) {
        self.finish(DeploymentStatus::Success, None);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.finish(DeploymentStatus::Failed, Some(error.into()));
    }

    /// Wall-clock duration, once the deployment has finished
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_time.map(|end| {
            end.signed_duration_since(self.start_time)
                .num_milliseconds()
                .max(0) as u64
        })
    }

    fn finish(&mut self, status: DeploymentStatus, error: Option<String>) {
        // Clock adjustments must not produce end < start
        let now = Utc::now();
        self.end_time = Some(now.max(self.start_time));
        self.status = status;
        self.error = error;
    }
}
