pub mod collaborators;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod scheduler;

#[cfg(test)]
mod fakes;

pub use collaborators::{ImageFetcher, LinkStore, Messenger};
pub use error::{Failure, FailureStage, RunError};
pub use ingest::IngestHandler;
pub use pipeline::{Pipeline, PipelineConfig, RunSummary};
