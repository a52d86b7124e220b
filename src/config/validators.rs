use std::net::SocketAddr;

use super::types::SystemConfig;
use crate::types::{Error, Result};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["json", "pretty", "compact"];

/// Validate listen address format (host:port)
pub(crate) fn validate_listen_address(addr: &str) -> Result<()> {
    addr.parse::<SocketAddr>().map_err(|_| Error::Validation {
        field: "server.listen".to_string(),
        message: format!(
            "Invalid listen address format '{}'. Expected format: 'host:port' (e.g., '0.0.0.0:9666')",
            addr
        ),
    })?;
    Ok(())
}

/// Validate that a directory exists
async fn validate_directory(path: &str, field: &str) -> Result<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::Validation {
            field: field.to_string(),
            message: format!("Cannot access path '{}': {}", path, e),
        })?;

    if !metadata.is_dir() {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!("Path '{}' is not a directory", path),
        });
    }

    Ok(())
}

/// Validate positive timeout value
pub(crate) fn validate_positive_timeout(value: u64, field: &str) -> Result<()> {
    if value == 0 {
        return Err(Error::Validation {
            field: field.to_string(),
            message: "Timeout must be greater than 0".to_string(),
        });
    }
    Ok(())
}

/// Validate that `value` lies in `min..=max`
pub(crate) fn validate_range(value: usize, field: &str, min: usize, max: usize) -> Result<()> {
    if value < min {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!("Value {} is below minimum allowed value {}", value, min),
        });
    }
    if value > max {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!("Value {} exceeds maximum allowed value {}", value, max),
        });
    }
    Ok(())
}

pub(crate) fn validate_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation {
            field: field.to_string(),
            message: "Value cannot be empty".to_string(),
        });
    }
    Ok(())
}

/// Parse size strings like "1MB", "500KB", "2GB" into bytes
pub(crate) fn parse_size_string(size: &str) -> Result<u64> {
    let size = size.trim().to_uppercase();
    let invalid = || Error::Validation {
        field: "size".to_string(),
        message: format!(
            "Invalid size format '{}'. Expected format: number + unit (KB/MB/GB) or plain bytes",
            size
        ),
    };

    let (number, multiplier) = if let Some(n) = size.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = size.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = size.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = size.strip_suffix('B') {
        (n, 1)
    } else {
        (size.as_str(), 1)
    };

    number
        .trim()
        .parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|_| invalid())
}

/// Validate request size string and ensure reasonable limits
pub(crate) fn validate_request_size(size: &str, field: &str) -> Result<()> {
    let bytes = parse_size_string(size).map_err(|mut e| {
        if let Error::Validation {
            field: ref mut field_ref,
            ..
        } = e
        {
            *field_ref = field.to_string();
        }
        e
    })?;

    const MIN_SIZE: u64 = 1024; // 1KB
    const MAX_SIZE: u64 = 100 * 1024 * 1024; // 100MB

    if bytes < MIN_SIZE {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!(
                "Request size {} bytes is below minimum {} (1KB)",
                bytes, MIN_SIZE
            ),
        });
    }

    if bytes > MAX_SIZE {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!(
                "Request size {} bytes exceeds maximum {} (100MB)",
                bytes, MAX_SIZE
            ),
        });
    }

    Ok(())
}

fn validate_one_of(value: &str, field: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!(
                "Invalid value '{}'. Must be one of: {}",
                value,
                allowed.join(", ")
            ),
        });
    }
    Ok(())
}

/// Metrics path must be absolute, a plain route without parameters or
/// wildcards, and must not shadow a built-in route
pub(crate) fn validate_metrics_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path.len() < 2 {
        return Err(Error::Validation {
            field: "monitoring.metrics_path".to_string(),
            message: format!("Metrics path '{}' must start with '/'", path),
        });
    }
    if path.contains(['{', '}']) {
        return Err(Error::Validation {
            field: "monitoring.metrics_path".to_string(),
            message: format!("Metrics path '{}' must not contain '{{' or '}}'", path),
        });
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(Error::Validation {
            field: "monitoring.metrics_path".to_string(),
            message: format!(
                "Metrics path '{}' has a segment starting with ':' or '*'",
                path
            ),
        });
    }
    if matches!(path, "/webhook" | "/health" | "/status") {
        return Err(Error::Validation {
            field: "monitoring.metrics_path".to_string(),
            message: format!("Metrics path '{}' collides with a built-in route", path),
        });
    }
    Ok(())
}

impl SystemConfig {
    /// Validate the configuration
    pub async fn validate(&self) -> Result<()> {
        validate_listen_address(&self.server.listen)?;
        validate_request_size(&self.server.max_request_size, "server.max_request_size")?;
        validate_positive_timeout(self.server.request_timeout, "server.request_timeout")?;
        validate_positive_timeout(self.server.shutdown_timeout, "server.shutdown_timeout")?;

        validate_not_empty(&self.deploy.script, "deploy.script")?;
        validate_not_empty(&self.deploy.environment, "deploy.environment")?;
        validate_positive_timeout(self.deploy.timeout, "deploy.timeout")?;
        validate_range(self.deploy.queue_capacity, "deploy.queue_capacity", 1, 1000)?;
        if let Some(ref working_dir) = self.deploy.working_dir {
            validate_directory(working_dir, "deploy.working_dir").await?;
        }

        validate_one_of(&self.logging.level, "logging.level", LOG_LEVELS)?;
        validate_one_of(&self.logging.format, "logging.format", LOG_FORMATS)?;
        if let Some(ref file) = self.logging.file {
            validate_not_empty(file, "logging.file")?;
        }

        if self.monitoring.metrics_enabled {
            validate_metrics_path(&self.monitoring.metrics_path)?;
        }

        Ok(())
    }
}
