use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{error, info, info_span, Instrument};

use super::job_worker::{Assignment, Completion, JobWorker};
use super::TaskCreator;
use crate::import::{JobRecord, Outcome, RunReport};

/// Log a progress line every this many completed records
const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Create one remote task per record across a pool of `worker_count` workers
///
/// # Concurrency Model
/// - Records are dealt round-robin to `min(worker_count, records.len())` workers
/// - Each worker is a spawned task that calls the API sequentially
/// - Outcomes travel over a channel to this coordinator, the only writer of the report
/// - The report lists outcomes in input order, whatever order they complete in
///
/// # Returns
/// - `Ok(RunReport)` - one outcome per record, failures included
/// - `Err(DispatchError)` - invalid pool size, nothing was dispatched
pub async fn dispatch(
    records: Vec<JobRecord>,
    worker_count: usize,
    creator: Arc<dyn TaskCreator>,
    delay: Duration,
) -> Result<RunReport, DispatchError> {
    if worker_count == 0 {
        return Err(DispatchError::NoWorkers);
    }
    if records.is_empty() {
        info!("No records to dispatch");
        return Ok(RunReport::default());
    }

    let total = records.len();
    let pool_size = worker_count.min(total);
    info!(
        "Starting task creation for {} records with {} workers",
        total, pool_size
    );

    let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

    let mut shares: Vec<Vec<Assignment>> = (0..pool_size).map(|_| Vec::new()).collect();
    for (index, record) in records.into_iter().enumerate() {
        shares[index % pool_size].push((index, record));
    }

    let (tx, mut rx) = mpsc::channel::<Completion>(pool_size * 2);

    let mut worker_handles = Vec::with_capacity(pool_size);
    for (offset, share) in shares.into_iter().enumerate() {
        let worker_id = offset + 1;
        let worker = JobWorker::new(creator.clone(), delay);
        let span = info_span!("worker", worker_id);
        worker_handles.push(tokio::spawn(
            worker.run(worker_id, share, tx.clone()).instrument(span),
        ));
    }
    // Workers hold the only senders now, so the loop below ends when they all do
    drop(tx);

    let mut slots: Vec<Option<Outcome>> = vec![None; total];
    let mut completed = 0;
    while let Some((index, outcome)) = rx.recv().await {
        slots[index] = Some(outcome);
        completed += 1;
        if completed % PROGRESS_EVERY == 0 {
            info!("Progress: {}/{} records processed", completed, total);
        }
    }

    for (offset, result) in join_all(worker_handles).await.into_iter().enumerate() {
        if let Err(e) = result {
            error!("Worker {} terminated abnormally: {}", offset + 1, e);
        }
    }

    let outcomes: Vec<Outcome> = slots
        .into_iter()
        .zip(ids)
        .map(|(slot, id)| {
            slot.unwrap_or_else(|| Outcome::Failure {
                id,
                error_message: "worker terminated before processing record".to_string(),
            })
        })
        .collect();

    let report = RunReport::new(outcomes);
    info!(
        "Dispatch finished. Successfully created: {}, Failed: {}",
        report.count_success(),
        report.count_failure()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cvat::RemoteError;
    use async_trait::async_trait;

    struct AlwaysOk;

    #[async_trait]
    impl TaskCreator for AlwaysOk {
        async fn create_task(&self, record: &JobRecord) -> Result<u64, RemoteError> {
            Ok(record.id.parse::<u64>().unwrap_or(0) + 1000)
        }
    }

    /// Panics on one id to simulate a worker dying mid-share
    struct PanicsOn(&'static str);

    #[async_trait]
    impl TaskCreator for PanicsOn {
        async fn create_task(&self, record: &JobRecord) -> Result<u64, RemoteError> {
            if record.id == self.0 {
                panic!("simulated crash on {}", record.id);
            }
            Ok(1)
        }
    }

    fn records(n: usize) -> Vec<JobRecord> {
        (1..=n)
            .map(|i| JobRecord {
                id: i.to_string(),
                image_url: format!("https://img.example/{}.jpg", i),
                labels: vec!["cat".to_string()],
            })
            .collect()
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let err = dispatch(records(1), 0, Arc::new(AlwaysOk), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::NoWorkers);
    }

    #[tokio::test]
    async fn empty_input_gives_empty_report() {
        let report = dispatch(Vec::new(), 4, Arc::new(AlwaysOk), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report.count_success(), 0);
        assert_eq!(report.count_failure(), 0);
    }

    #[tokio::test]
    async fn outcomes_follow_input_order() {
        let report = dispatch(records(7), 3, Arc::new(AlwaysOk), Duration::ZERO)
            .await
            .unwrap();

        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7"]);
        assert_eq!(
            report.outcomes[4],
            Outcome::Success {
                id: "5".to_string(),
                remote_task_id: 1005
            }
        );
    }

    #[tokio::test]
    async fn more_workers_than_records_is_fine() {
        let report = dispatch(records(2), 16, Arc::new(AlwaysOk), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report.count_success(), 2);
    }

    #[tokio::test]
    async fn crashed_worker_leaves_failures_not_gaps() {
        // Single worker: everything from the crash onwards is unprocessed
        let report = dispatch(records(4), 1, Arc::new(PanicsOn("2")), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert!(report.outcomes[0].is_success());
        for outcome in &report.outcomes[1..] {
            assert_eq!(
                outcome,
                &Outcome::Failure {
                    id: outcome.id().to_string(),
                    error_message: "worker terminated before processing record".to_string(),
                }
            );
        }
    }
}
