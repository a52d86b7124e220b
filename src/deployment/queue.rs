use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::metrics;
use crate::types::{DeploymentRequest, Error, Result};

/// Items carried by the deploy channel
#[derive(Debug)]
pub(crate) enum QueueMessage {
    Deploy(DeploymentRequest),
    /// Ends the worker loop once everything queued before it is processed
    Shutdown,
}

/// Producer side of the bounded deployment queue.
///
/// Enqueueing never waits: a full queue is reported immediately so the HTTP
/// handler can answer 503.
#[derive(Debug, Clone)]
pub struct DeployQueue {
    sender: mpsc::Sender<QueueMessage>,
}

/// Create a queue holding at most `capacity` pending requests
pub(crate) fn channel(capacity: usize) -> (DeployQueue, mpsc::Receiver<QueueMessage>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (DeployQueue { sender }, receiver)
}

impl DeployQueue {
    pub fn enqueue(&self, request: DeploymentRequest) -> Result<()> {
        match self.sender.try_send(QueueMessage::Deploy(request)) {
            Ok(()) => {
                let size = self.size();
                metrics::set_queue_size(size);
                debug!(queue_size = size, "Deployment request queued");
                Ok(())
            }
            Err(TrySendError::Full(QueueMessage::Deploy(request))) => {
                warn!(
                    version = %request.version,
                    capacity = self.capacity(),
                    "Deployment queue full, rejecting request"
                );
                Err(Error::QueueFull {
                    capacity: self.capacity(),
                })
            }
            Err(TrySendError::Full(_)) => Err(Error::QueueFull {
                capacity: self.capacity(),
            }),
            Err(TrySendError::Closed(_)) => Err(Error::QueueClosed),
        }
    }

    /// Requests waiting to be picked up by the worker
    pub fn size(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Queue the shutdown sentinel behind any pending requests.
    ///
    /// Unlike [`enqueue`](Self::enqueue) this waits for a free slot.
    pub(crate) async fn close(&self) -> Result<()> {
        self.sender
            .send(QueueMessage::Shutdown)
            .await
            .map_err(|_| Error::QueueClosed)
    }
}
