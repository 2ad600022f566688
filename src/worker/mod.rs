pub mod dispatcher;
pub mod job_worker;

use async_trait::async_trait;

use crate::cvat::RemoteError;
use crate::import::JobRecord;

pub use dispatcher::{dispatch, DispatchError};
pub use job_worker::JobWorker;

/// The one remote call a worker needs: create a task for a record
#[async_trait]
pub trait TaskCreator: Send + Sync {
    /// Create the remote task and return its id
    async fn create_task(&self, record: &JobRecord) -> Result<u64, RemoteError>;
}
