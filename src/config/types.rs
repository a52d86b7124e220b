use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::{ConfigError, Result};

/// Environment variables that override file configuration
pub mod env {
    pub const WEBHOOK_SECRET: &str = "WEBHOOK_SECRET";
    pub const DEPLOY_SCRIPT: &str = "DEPLOY_SCRIPT";
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
    pub const PORT: &str = "PORT";
}

/// System configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct WebhookConfig {
    /// Shared HMAC secret. Empty disables signature checking.
    #[serde(default)]
    pub secret: String,
}

// The secret must never reach the logs through `{:?}`
impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret_configured", &!self.secret.is_empty())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default = "default_deploy_script")]
    pub script: String,
    /// Arguments placed before the version and environment
    #[serde(default)]
    pub script_args: Vec<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Deploy action timeout in seconds
    #[serde(default = "default_deploy_timeout")]
    pub timeout: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Also append log lines to this file
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

/// The slice of configuration the deployment dispatcher consumes
#[derive(Clone)]
pub struct DispatcherConfig {
    pub secret: String,
    pub environment: String,
    pub queue_capacity: usize,
    pub deploy_timeout: Duration,
}

impl std::fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherConfig")
            .field("secret_configured", &!self.secret.is_empty())
            .field("environment", &self.environment)
            .field("queue_capacity", &self.queue_capacity)
            .field("deploy_timeout", &self.deploy_timeout)
            .finish()
    }
}

impl SystemConfig {
    /// Load system configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::FileNotFound { path: path_str })?;

        let config: SystemConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise start from defaults, then
    /// apply environment overrides from the process environment.
    pub fn load<P: AsRef<Path>>(path: P, required: bool) -> Result<Self> {
        let mut config = if required || path.as_ref().exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides using `lookup` to resolve environment variables.
    /// Empty values are ignored, except for the secret where an explicitly
    /// empty value is meaningful.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(env::WEBHOOK_SECRET) {
            self.webhook.secret = secret;
        }
        if let Some(script) = lookup(env::DEPLOY_SCRIPT).filter(|s| !s.is_empty()) {
            self.deploy.script = script;
        }
        if let Some(environment) = lookup(env::ENVIRONMENT).filter(|s| !s.is_empty()) {
            self.deploy.environment = environment;
        }
        if let Some(port) = lookup(env::PORT).filter(|s| !s.is_empty()) {
            self.server.listen = replace_port(&self.server.listen, &port);
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            secret: self.webhook.secret.clone(),
            environment: self.deploy.environment.clone(),
            queue_capacity: self.deploy.queue_capacity,
            deploy_timeout: Duration::from_secs(self.deploy.timeout),
        }
    }
}

/// Swap the port of a `host:port` listen address, keeping the host
fn replace_port(listen: &str, port: &str) -> String {
    match listen.rsplit_once(':') {
        Some((host, _)) => format!("{}:{}", host, port),
        None => format!("{}:{}", listen, port),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_request_size: default_max_request_size(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            script: default_deploy_script(),
            script_args: Vec::new(),
            environment: default_environment(),
            timeout: default_deploy_timeout(),
            queue_capacity: default_queue_capacity(),
            working_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
            metrics_path: default_metrics_path(),
        }
    }
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:9666".to_string()
}

fn default_max_request_size() -> String {
    "1MB".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_deploy_script() -> String {
    "/opt/app/deploy/deploy.sh".to_string()
}

fn default_environment() -> String {
    "prod".to_string()
}

fn default_deploy_timeout() -> u64 {
    600
}

fn default_queue_capacity() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
