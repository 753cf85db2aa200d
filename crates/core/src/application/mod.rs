// Application Layer - Use Cases

pub mod admission;
pub mod constants;
pub mod predict;
pub mod shutdown;

// Re-exports
pub use admission::AdmissionControl;
pub use predict::{Prediction, PredictionOutput, PredictionService};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
