use parking_lot::RwLock;
use std::sync::Arc;

use crate::types::DeploymentRecord;

type SharedRecord = Arc<RwLock<Option<DeploymentRecord>>>;

/// Read access to the current (or most recent) deployment
#[derive(Debug, Clone)]
pub struct DeploymentState {
    record: SharedRecord,
}

/// The only handle allowed to change the deployment record.
///
/// Not `Clone`; it is created once alongside the state and moved into the
/// worker.
#[derive(Debug)]
pub struct DeploymentStateWriter {
    record: SharedRecord,
}

impl DeploymentState {
    pub fn new() -> (Self, DeploymentStateWriter) {
        let record = SharedRecord::default();
        (
            Self {
                record: Arc::clone(&record),
            },
            DeploymentStateWriter { record },
        )
    }

    /// Copy of the record, `None` before the first deployment
    pub fn snapshot(&self) -> Option<DeploymentRecord> {
        self.record.read().clone()
    }
}

impl DeploymentStateWriter {
    /// Replace the record wholesale
    pub fn publish(&self, record: DeploymentRecord) {
        *self.record.write() = Some(record);
    }
}
