//! Deployment queueing and execution
//!
//! [`DeploymentService`] owns the bounded queue, the deployment record and
//! the single worker task. HTTP handlers share it through an `Arc`: they
//! enqueue requests and read snapshots, while only the worker runs the
//! deploy action and writes the record.

mod queue;
mod state;
mod worker;

pub use state::DeploymentState;

use queue::DeployQueue;
use worker::DeployWorker;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DispatcherConfig;
use crate::execution::DeployAction;
use crate::types::{DeploymentRecord, DeploymentRequest, Error, Result};

pub struct DeploymentService {
    queue: DeployQueue,
    state: DeploymentState,
    /// Present until [`start`](Self::start) moves it onto a task
    worker: Mutex<Option<DeployWorker>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeploymentService {
    pub fn new(config: &DispatcherConfig, action: Arc<dyn DeployAction>) -> Self {
        let (queue, receiver) = queue::channel(config.queue_capacity);
        let (state, writer) = DeploymentState::new();
        let worker = DeployWorker::new(
            receiver,
            writer,
            action,
            config.environment.clone(),
            config.deploy_timeout,
        );

        debug!(config = ?config, "Deployment service created");

        Self {
            queue,
            state,
            worker: Mutex::new(Some(worker)),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the worker task. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let worker = self
            .worker
            .lock()
            .take()
            .ok_or_else(|| Error::Application("Deploy worker already started".to_string()))?;

        let handle = tokio::spawn(worker.run());
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Queue a deployment without waiting
    pub fn enqueue(&self, request: DeploymentRequest) -> Result<()> {
        self.queue.enqueue(request)
    }

    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn snapshot(&self) -> Option<DeploymentRecord> {
        self.state.snapshot()
    }

    /// Let the worker finish what is queued, then stop it.
    ///
    /// Waits at most `limit`; past that the worker task is aborted, which
    /// kills a running deploy action. Further enqueues fail with
    /// [`Error::QueueClosed`].
    pub async fn stop(&self, limit: Duration) -> Result<()> {
        let handle = self.handle.lock().take();
        let Some(mut handle) = handle else {
            // Never started: dropping the worker closes the queue
            self.worker.lock().take();
            debug!("Deploy worker was not running");
            return Ok(());
        };

        info!(
            pending = self.queue.size(),
            timeout_secs = limit.as_secs(),
            "Stopping deploy worker"
        );

        let shutdown = async {
            if self.queue.close().await.is_err() {
                debug!("Deploy worker already exited");
            }
            (&mut handle).await
        };

        match tokio::time::timeout(limit, shutdown).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_error)) => Err(Error::Application(format!(
                "Deploy worker terminated abnormally: {}",
                join_error
            ))),
            Err(_) => {
                warn!(
                    timeout_secs = limit.as_secs(),
                    "Deploy worker did not stop in time, aborting"
                );
                handle.abort();
                Ok(())
            }
        }
    }
}
