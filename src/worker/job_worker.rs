use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use super::TaskCreator;
use crate::import::{JobRecord, Outcome};

/// A record handed to a worker, tagged with its position in the input
pub type Assignment = (usize, JobRecord);

/// Outcome sent back to the coordinator, tagged with the input position
pub type Completion = (usize, Outcome);

/// Worker that creates remote tasks for its share of the records
pub struct JobWorker {
    creator: Arc<dyn TaskCreator>,
    delay: Duration,
}

impl JobWorker {
    /// Create a new JobWorker instance
    ///
    /// # Arguments
    /// - `creator` - remote task API shared by all workers
    /// - `delay` - pause between two consecutive calls of this worker
    pub fn new(creator: Arc<dyn TaskCreator>, delay: Duration) -> Self {
        Self { creator, delay }
    }

    /// Process assigned records strictly one after another
    ///
    /// # Architecture
    /// - One blocking remote call per record, exactly once, no retry
    /// - A failed call becomes a `Failure` outcome and the worker moves on
    /// - Every outcome is sent to the coordinator; the worker never touches the report
    /// - Stops early only if the coordinator has gone away
    pub async fn run(
        self,
        worker_id: usize,
        assignments: Vec<Assignment>,
        outcomes: mpsc::Sender<Completion>,
    ) {
        info!(
            "Worker {} started with {} records",
            worker_id,
            assignments.len()
        );

        for (position, (index, record)) in assignments.into_iter().enumerate() {
            if position > 0 && !self.delay.is_zero() {
                sleep(self.delay).await;
            }

            let outcome = self.process(&record).await;

            if outcomes.send((index, outcome)).await.is_err() {
                error!(
                    "Worker {} lost its coordinator, stopping before record {}",
                    worker_id, record.id
                );
                return;
            }
        }

        debug!("Worker {} finished its records", worker_id);
    }

    async fn process(&self, record: &JobRecord) -> Outcome {
        match self.creator.create_task(record).await {
            Ok(remote_task_id) => {
                info!("Created task {} for image {}", remote_task_id, record.id);
                Outcome::Success {
                    id: record.id.clone(),
                    remote_task_id,
                }
            }
            Err(e) => {
                error!("Error creating task for image {}: {}", record.id, e);
                Outcome::Failure {
                    id: record.id.clone(),
                    error_message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cvat::RemoteError;
    use async_trait::async_trait;
    use std::io;
    use std::sync::Mutex;
    use tracing::Instrument;

    /// Records calls and rejects ids starting with "bad"
    #[derive(Default)]
    struct RecordingCreator {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskCreator for RecordingCreator {
        async fn create_task(&self, record: &JobRecord) -> Result<u64, RemoteError> {
            self.calls.lock().unwrap().push(record.id.clone());
            if record.id.starts_with("bad") {
                return Err(RemoteError::Status {
                    status: 400,
                    body: "rejected".to_string(),
                });
            }
            Ok(record.id.len() as u64)
        }
    }

    fn record(id: &str) -> JobRecord {
        JobRecord {
            id: id.to_string(),
            image_url: format!("https://img.example/{}.jpg", id),
            labels: Vec::new(),
        }
    }

    #[tokio::test]
    async fn processes_assignments_in_order_and_keeps_going_after_failure() {
        let creator = Arc::new(RecordingCreator::default());
        let worker = JobWorker::new(creator.clone(), Duration::ZERO);
        let (tx, mut rx) = mpsc::channel(8);

        worker
            .run(
                1,
                vec![(0, record("a")), (3, record("bad1")), (6, record("ccc"))],
                tx,
            )
            .await;

        let mut received = Vec::new();
        while let Some(completion) = rx.recv().await {
            received.push(completion);
        }

        assert_eq!(*creator.calls.lock().unwrap(), vec!["a", "bad1", "ccc"]);
        assert_eq!(
            received,
            vec![
                (
                    0,
                    Outcome::Success {
                        id: "a".to_string(),
                        remote_task_id: 1
                    }
                ),
                (
                    3,
                    Outcome::Failure {
                        id: "bad1".to_string(),
                        error_message: "HTTP 400: rejected".to_string()
                    }
                ),
                (
                    6,
                    Outcome::Success {
                        id: "ccc".to_string(),
                        remote_task_id: 3
                    }
                ),
            ]
        );
    }

    #[tokio::test]
    async fn stops_when_coordinator_is_gone() {
        let creator = Arc::new(RecordingCreator::default());
        let worker = JobWorker::new(creator.clone(), Duration::ZERO);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        worker
            .run(1, vec![(0, record("a")), (1, record("b"))], tx)
            .await;

        assert_eq!(*creator.calls.lock().unwrap(), vec!["a"]);
    }

    /// In-memory log sink shared with the fmt layer
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn outcome_lines_carry_worker_id_once_from_span() {
        let buffer = LogBuffer::default();
        let sink = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let worker = JobWorker::new(Arc::new(RecordingCreator::default()), Duration::ZERO);
        let (tx, mut rx) = mpsc::channel(4);
        worker
            .run(7, vec![(0, record("a")), (1, record("bad1"))], tx)
            .instrument(tracing::info_span!("worker", worker_id = 7))
            .await;
        while rx.recv().await.is_some() {}

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let outcome_lines: Vec<&str> = output
            .lines()
            .filter(|line| line.contains("for image"))
            .collect();
        assert_eq!(outcome_lines.len(), 2);
        for line in outcome_lines {
            assert_eq!(line.matches("worker_id").count(), 1, "{}", line);
        }
    }
}
