// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod prediction_tool;
pub mod scratch_store;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use prediction_tool::{
    ByteStream, ExecutionError, ExecutionResult, ExecutionStatus, PredictionTool,
};
pub use scratch_store::{ScratchError, ScratchSpace, ScratchStore};
pub use time_provider::TimeProvider;
