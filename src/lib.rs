pub mod config;
pub mod duck;
pub mod process;
pub mod report;
pub mod schema;

pub use config::IngestConfig;
pub use report::{FileReport, IngestSummary};
