// Domain Layer - Pure prediction request model and tool contract

pub mod error;
pub mod invocation;
pub mod prediction;

// Re-exports
pub use error::DomainError;
pub use invocation::{Invocation, ToolSettings};
pub use prediction::{InputFormat, OutputMode, PredictionRequest, ProbabilityThreshold, Smiles};
