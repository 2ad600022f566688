//! Bulk creation of CVAT annotation tasks from a CSV file.
//!
//! Rows are loaded and validated into [`import::JobRecord`]s, then
//! [`worker::dispatch`] spreads them over a fixed pool of workers that each
//! create one remote task per record. Per-record failures end up in the
//! [`import::RunReport`]; only configuration, load and authentication
//! problems stop a run.

pub mod app;
pub mod cli;
pub mod config;
pub mod cvat;
pub mod error;
pub mod import;
pub mod logging;
pub mod worker;
