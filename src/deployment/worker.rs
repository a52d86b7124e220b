use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, Instrument};

use super::queue::QueueMessage;
use super::state::DeploymentStateWriter;
use crate::execution::{ActionOutput, DeployAction};
use crate::logging;
use crate::metrics;
use crate::types::{DeploymentRecord, DeploymentRequest, DeploymentStatus, ExecutionError};

/// Single consumer of the deploy queue. Deployments run strictly one after
/// another, in the order they were queued.
pub struct DeployWorker {
    receiver: mpsc::Receiver<QueueMessage>,
    state: DeploymentStateWriter,
    action: Arc<dyn DeployAction>,
    environment: String,
    timeout: Duration,
}

impl DeployWorker {
    pub(crate) fn new(
        receiver: mpsc::Receiver<QueueMessage>,
        state: DeploymentStateWriter,
        action: Arc<dyn DeployAction>,
        environment: String,
        timeout: Duration,
    ) -> Self {
        Self {
            receiver,
            state,
            action,
            environment,
            timeout,
        }
    }

    /// Drain the queue until the shutdown sentinel arrives or every
    /// producer is gone
    pub async fn run(mut self) {
        info!(
            action = %self.action.describe(),
            environment = %self.environment,
            timeout_secs = self.timeout.as_secs(),
            "Deploy worker started"
        );

        while let Some(message) = self.receiver.recv().await {
            metrics::set_queue_size(self.receiver.len());
            match message {
                QueueMessage::Deploy(request) => {
                    let span = logging::deployment_span(&request.version);
                    self.execute_deployment(request).instrument(span).await;
                }
                QueueMessage::Shutdown => {
                    debug!("Shutdown sentinel received");
                    break;
                }
            }
        }

        info!("Deploy worker stopped");
    }

    /// Run one deployment to completion and publish its outcome
    pub(crate) async fn execute_deployment(
        &mut self,
        request: DeploymentRequest,
    ) -> DeploymentRecord {
        let mut record = DeploymentRecord::started(&request);
        self.state.publish(record.clone());
        metrics::record_deployment_started();

        info!(
            repository = request.repository.as_deref().unwrap_or("-"),
            environment = %self.environment,
            "Deployment started"
        );

        let result = self
            .action
            .run(&request.version, &self.environment, self.timeout)
            .await;
        self.apply_outcome(&mut record, result);
        debug_assert!(record.status.is_terminal());

        self.state.publish(record.clone());
        let duration_ms = record.duration_ms().unwrap_or(0);
        metrics::record_deployment_complete(record.status, duration_ms);

        match record.status {
            DeploymentStatus::Success => {
                info!(duration_ms = duration_ms, "Deployment succeeded");
            }
            _ => {
                error!(
                    duration_ms = duration_ms,
                    error = record.error.as_deref().unwrap_or_default(),
                    "Deployment failed"
                );
            }
        }

        record
    }

    fn apply_outcome(
        &self,
        record: &mut DeploymentRecord,
        result: Result<ActionOutput, ExecutionError>,
    ) {
        match result {
            Ok(output) if output.success() => {
                if !output.stdout.trim().is_empty() {
                    info!(stdout = %output.stdout.trim_end(), "Deploy action output");
                }
                record.succeed();
            }
            Ok(output) => {
                let code = output
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                error!(
                    exit_code = %code,
                    stdout = %output.stdout.trim_end(),
                    stderr = %output.stderr.trim_end(),
                    "Deploy action exited with failure"
                );
                record.fail(format!(
                    "exit code {}; stderr: {}",
                    code,
                    output.stderr.trim_end()
                ));
            }
            Err(ExecutionError::Timeout { .. }) => {
                record.fail(format!(
                    "deployment timeout (>{}s)",
                    self.timeout.as_secs()
                ));
            }
            Err(e) => {
                record.fail(e.to_string());
            }
        }
    }
}
