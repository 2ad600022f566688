pub mod dto;
pub mod loader;
pub mod models;

// Re-export commonly used types
pub use dto::{FailedRecord, Outcome, ReportError, RunReport};
pub use loader::{load, load_from_reader, InvalidRowPolicy, LoadError, LoadedRows};
pub use models::{parse_labels, JobRecord, LabelError, RowRejection};
