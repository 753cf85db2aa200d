// Prediction Tool Invocation Contract
//
// cfm-predict positional arguments, in order:
//   <input> <prob_thresh> <param_file> <config_file> <annotate_fragments>
//   <output> <apply_postprocessing> <suppress_exceptions>

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::prediction::ProbabilityThreshold;

pub const DEFAULT_PREDICT_BIN: &str = "cfm-predict";
pub const DEFAULT_PARAM_OUTPUT: &str = "/trained_models_cfmid4.0/cfmid4/[M+H]+/param_output.log";
pub const DEFAULT_PARAM_CONFIG: &str = "/trained_models_cfmid4.0/cfmid4/[M+H]+/param_config.txt";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed per-deployment settings for the external prediction tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub executable: PathBuf,
    pub param_output: PathBuf,
    pub param_config: PathBuf,
    pub default_prob_thresh: ProbabilityThreshold,
    pub annotate_fragments: bool,
    pub postprocess: bool,
    pub suppress_exceptions: bool,
    pub timeout: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_PREDICT_BIN),
            param_output: PathBuf::from(DEFAULT_PARAM_OUTPUT),
            param_config: PathBuf::from(DEFAULT_PARAM_CONFIG),
            default_prob_thresh: ProbabilityThreshold::default(),
            annotate_fragments: false,
            postprocess: true,
            suppress_exceptions: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One fully resolved call of the prediction tool
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub executable: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub prob_thresh: ProbabilityThreshold,
    pub param_output: PathBuf,
    pub param_config: PathBuf,
    pub annotate_fragments: bool,
    pub postprocess: bool,
    pub suppress_exceptions: bool,
    pub timeout: Duration,
}

impl Invocation {
    /// Resolve an invocation from settings, scratch paths and an optional override
    pub fn new(
        settings: &ToolSettings,
        input_path: &Path,
        output_path: &Path,
        prob_thresh: Option<ProbabilityThreshold>,
    ) -> Self {
        Self {
            executable: settings.executable.clone(),
            input_path: input_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            prob_thresh: prob_thresh.unwrap_or(settings.default_prob_thresh),
            param_output: settings.param_output.clone(),
            param_config: settings.param_config.clone(),
            annotate_fragments: settings.annotate_fragments,
            postprocess: settings.postprocess,
            suppress_exceptions: settings.suppress_exceptions,
            timeout: settings.timeout,
        }
    }

    /// Positional arguments, excluding the executable
    pub fn args(&self) -> Vec<String> {
        vec![
            self.input_path.display().to_string(),
            self.prob_thresh.to_string(),
            self.param_output.display().to_string(),
            self.param_config.display().to_string(),
            flag(self.annotate_fragments),
            self.output_path.display().to_string(),
            flag(self.postprocess),
            flag(self.suppress_exceptions),
        ]
    }
}

fn flag(enabled: bool) -> String {
    if enabled { "1" } else { "0" }.to_string()
}
