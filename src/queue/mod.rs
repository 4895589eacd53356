//! Work queues used by the scan steps.
//!
//! - [`FileScanQueue`] - std worker threads decoding files
//! - [`JobQueue`] - bounded tokio tasks computing associations

pub mod file_scan;
pub mod job;

pub use file_scan::{FileScanQueue, FileScanResult, FileScanTask};
pub use job::{JobHandler, JobQueue};
