#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cvat_bulk_import::cvat::RemoteError;
use cvat_bulk_import::import::JobRecord;
use cvat_bulk_import::worker::TaskCreator;
use tempfile::NamedTempFile;

/// Write `contents` to a temporary CSV file
pub fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("create temp csv");
    file.write_all(contents.as_bytes()).expect("write temp csv");
    file.flush().expect("flush temp csv");
    file
}

pub fn records(n: usize) -> Vec<JobRecord> {
    (1..=n)
        .map(|i| JobRecord {
            id: format!("img-{}", i),
            image_url: format!("https://img.example/{}.jpg", i),
            labels: vec!["cat".to_string(), "dog".to_string()],
        })
        .collect()
}

fn rejection(id: &str) -> RemoteError {
    RemoteError::Status {
        status: 400,
        body: format!("task for {} rejected", id),
    }
}

/// Outcome depends only on the record: ids listed in `failing` are rejected,
/// everything else gets a task id derived from the record id
pub struct DeterministicCreator {
    failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl DeterministicCreator {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TaskCreator for DeterministicCreator {
    async fn create_task(&self, record: &JobRecord) -> Result<u64, RemoteError> {
        self.calls.lock().unwrap().push(record.id.clone());
        tokio::task::yield_now().await;
        if self.failing.contains(&record.id) {
            return Err(rejection(&record.id));
        }
        let digits: String = record.id.chars().filter(char::is_ascii_digit).collect();
        Ok(digits.parse::<u64>().unwrap_or(0) + 500)
    }
}

/// Fails every odd-numbered call (1st, 3rd, ...) in arrival order
#[derive(Default)]
pub struct OddCallFails {
    calls: AtomicUsize,
}

#[async_trait]
impl TaskCreator for OddCallFails {
    async fn create_task(&self, record: &JobRecord) -> Result<u64, RemoteError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % 2 == 1 {
            return Err(rejection(&record.id));
        }
        Ok(call as u64)
    }
}
