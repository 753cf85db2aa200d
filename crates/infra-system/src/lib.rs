// CFM-ID Wrapper Infrastructure - System Adapters
// Implements: PredictionTool, ScratchStore

pub mod cfm_predict_tool;
pub mod temp_scratch_store;

pub use cfm_predict_tool::CfmPredictTool;
pub use temp_scratch_store::TempScratchStore;
