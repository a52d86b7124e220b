use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::types::ExecutionError;

/// Maximum size for captured stdout/stderr to prevent memory issues
const MAX_OUTPUT_SIZE: usize = 10 * 1024; // 10KB per stream

/// Captured result of a deploy action that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ActionOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The external program that performs a deployment
#[async_trait]
pub trait DeployAction: Send + Sync {
    /// Run the deployment for `version` in `environment`.
    ///
    /// A non-zero exit is not an error here; it is reported through
    /// [`ActionOutput::exit_code`]. Errors are reserved for the action
    /// exceeding `timeout` or failing to start.
    async fn run(
        &self,
        version: &str,
        environment: &str,
        timeout: Duration,
    ) -> Result<ActionOutput, ExecutionError>;

    /// Human-readable description used in logs
    fn describe(&self) -> String;
}

/// Runs a deploy script as `script [args..] <version> <environment>`
#[derive(Debug, Clone)]
pub struct ScriptDeployAction {
    pub script: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ScriptDeployAction {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, working_dir: Option<PathBuf>) -> Self {
        self.working_dir = working_dir;
        self
    }

    fn command_line(&self, version: &str, environment: &str) -> Vec<String> {
        let mut line = Vec::with_capacity(self.args.len() + 3);
        line.push(self.script.clone());
        line.extend(self.args.iter().cloned());
        line.push(version.to_string());
        line.push(environment.to_string());
        line
    }
}

#[async_trait]
impl DeployAction for ScriptDeployAction {
    async fn run(
        &self,
        version: &str,
        environment: &str,
        limit: Duration,
    ) -> Result<ActionOutput, ExecutionError> {
        let command_line = self.command_line(version, environment);
        let command_str = command_line.join(" ");

        debug!(
            command = %command_str,
            working_dir = ?self.working_dir,
            timeout_secs = limit.as_secs(),
            "Executing deploy action"
        );

        let mut cmd = Command::new(&self.script);
        cmd.args(&command_line[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            // Dropping the output future on timeout must not leave the script running
            .kill_on_drop(true);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        let start_time = Instant::now();
        let execution_result = timeout(limit, cmd.output()).await;
        let duration_ms = start_time.elapsed().as_millis() as u64;

        match execution_result {
            Ok(Ok(output)) => {
                let result = ActionOutput {
                    exit_code: output.status.code(),
                    stdout: truncate_output(output.stdout),
                    stderr: truncate_output(output.stderr),
                };

                debug!(
                    command = %command_str,
                    exit_code = ?result.exit_code,
                    duration_ms = duration_ms,
                    stdout_len = result.stdout.len(),
                    stderr_len = result.stderr.len(),
                    "Deploy action completed"
                );

                Ok(result)
            }
            Ok(Err(io_error)) => {
                error!(
                    command = %command_str,
                    error = %io_error,
                    "Failed to start deploy action"
                );
                Err(ExecutionError::StartFailed {
                    command: command_str,
                    source: io_error,
                })
            }
            Err(_elapsed) => {
                warn!(
                    command = %command_str,
                    timeout_secs = limit.as_secs(),
                    duration_ms = duration_ms,
                    "Deploy action timed out"
                );
                Err(ExecutionError::Timeout {
                    command: command_str,
                    timeout: limit.as_secs(),
                })
            }
        }
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.script.clone()
        } else {
            format!("{} {}", self.script, self.args.join(" "))
        }
    }
}

/// Truncate command output to prevent memory issues
fn truncate_output(output: Vec<u8>) -> String {
    let output_str = String::from_utf8_lossy(&output);
    if output_str.len() > MAX_OUTPUT_SIZE {
        let mut cut = MAX_OUTPUT_SIZE;
        while !output_str.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... [truncated at {} bytes]",
            &output_str[..cut],
            MAX_OUTPUT_SIZE
        )
    } else {
        output_str.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn shell(script: &str) -> ScriptDeployAction {
        // sh -c '<script>' <version> <environment> binds $0 and $1
        ScriptDeployAction::new("sh").with_args(vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_successful_deploy_action() {
        let action = shell("echo deploying $0 to $1");

        let output = action
            .run("v1.2.3", "prod", Duration::from_secs(10))
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "deploying v1.2.3 to prod");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported_not_raised() {
        let action = shell("echo partial; echo broken >&2; exit 3");

        let output = action
            .run("v1.0.0", "prod", Duration::from_secs(10))
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "partial");
        assert_eq!(output.stderr.trim(), "broken");
    }

    #[tokio::test]
    async fn test_deploy_action_timeout() {
        let action = shell("sleep 5");

        let result = action
            .run("v1.0.0", "prod", Duration::from_millis(100))
            .await;

        match result {
            Err(ExecutionError::Timeout { command, timeout }) => {
                assert!(command.contains("sleep 5"));
                assert_eq!(timeout, 0); // Timeout was less than 1 second
            }
            other => panic!("Expected Timeout error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_script() {
        let action = ScriptDeployAction::new("/nonexistent/deploy.sh");

        let result = action
            .run("v1.0.0", "prod", Duration::from_secs(10))
            .await;

        match result {
            Err(ExecutionError::StartFailed { command, .. }) => {
                assert_eq!(command, "/nonexistent/deploy.sh v1.0.0 prod");
            }
            other => panic!("Expected StartFailed error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_working_directory() {
        let temp_dir = tempdir().unwrap();
        let action = shell("pwd").with_working_dir(Some(temp_dir.path().to_path_buf()));

        let output = action
            .run("v1.0.0", "prod", Duration::from_secs(10))
            .await
            .unwrap();

        let expected = temp_dir.path().canonicalize().unwrap();
        let actual = std::path::Path::new(output.stdout.trim())
            .canonicalize()
            .unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_command_line_order() {
        let action = ScriptDeployAction::new("/opt/deploy.sh")
            .with_args(vec!["--verbose".to_string()]);

        assert_eq!(
            action.command_line("v2.0.0", "staging"),
            vec!["/opt/deploy.sh", "--verbose", "v2.0.0", "staging"]
        );
        assert_eq!(action.describe(), "/opt/deploy.sh --verbose");
        assert_eq!(ScriptDeployAction::new("/opt/deploy.sh").describe(), "/opt/deploy.sh");
    }

    #[test]
    fn test_truncate_output() {
        let small_output = b"hello world".to_vec();
        assert_eq!(truncate_output(small_output), "hello world");

        let large_output = "x".repeat(MAX_OUTPUT_SIZE + 100).into_bytes();
        let result = truncate_output(large_output);
        assert!(result.contains("truncated"));
        assert!(result.len() > MAX_OUTPUT_SIZE); // Includes truncation message
    }

    #[test]
    fn test_truncate_output_respects_char_boundaries() {
        // 'é' is two bytes; an odd cut point would split it
        let large_output = format!("a{}", "é".repeat(MAX_OUTPUT_SIZE)).into_bytes();
        let result = truncate_output(large_output);
        assert!(result.contains("truncated"));
    }
}
