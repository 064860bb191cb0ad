mod adapter;
mod error;
mod models;
pub mod normalizer;
mod orchestrator;

#[cfg(feature = "mock")]
pub use adapter::MockBackendAdapter;
pub use adapter::{AdapterError, BackendAdapter, HttpBackendAdapter};
pub use error::OrchestrationError;
pub use models::*;
pub use normalizer::normalize;
pub use orchestrator::Orchestrator;
