pub mod config;
pub mod errors;
pub mod optimization;
pub mod pipeline;
pub mod reporting;
mod shared;
pub mod validation;

pub use errors::PipelineError;
