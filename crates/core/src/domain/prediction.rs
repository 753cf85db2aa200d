// Prediction Request Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{DomainError, Result};

/// Default probability threshold passed to the prediction tool
pub const DEFAULT_PROB_THRESH: f64 = 0.001;

/// Chemical structure string (SMILES)
///
/// Guaranteed non-empty and single-line. Surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Smiles(String);

impl Smiles {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::MissingSmiles);
        }
        // The tool reads one molecule per line
        if trimmed.contains(['\n', '\r']) {
            return Err(DomainError::MultiLineSmiles);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Smiles {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Smiles> for String {
    fn from(value: Smiles) -> Self {
        value.0
    }
}

impl fmt::Display for Smiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Probability threshold in (0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityThreshold(f64);

impl ProbabilityThreshold {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 || value > 1.0 {
            return Err(DomainError::InvalidThreshold(format!(
                "{} is outside (0, 1]",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for ProbabilityThreshold {
    fn default() -> Self {
        Self(DEFAULT_PROB_THRESH)
    }
}

impl FromStr for ProbabilityThreshold {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| DomainError::InvalidThreshold(format!("'{}' is not a number", s)))?;
        Self::new(value)
    }
}

impl fmt::Display for ProbabilityThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Layout of the line written to the tool's input file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// Bare SMILES string
    #[default]
    Raw,
    /// `"<id> <smiles>"`, for the tool's molecule-list mode
    Identified { id: String },
}

impl InputFormat {
    pub fn identified(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidIdentifier(id));
        }
        Ok(Self::Identified { id })
    }

    /// Render the input file contents for a structure
    pub fn render(&self, smiles: &Smiles) -> String {
        match self {
            InputFormat::Raw => smiles.as_str().to_string(),
            InputFormat::Identified { id } => format!("{} {}", id, smiles),
        }
    }
}

/// How tool output is relayed to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Read the completed output file and return it in one body
    #[default]
    Buffered,
    /// Relay the child's stderr and stdout as they are produced
    Streaming,
}

impl FromStr for OutputMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffered" => Ok(OutputMode::Buffered),
            "streaming" => Ok(OutputMode::Streaming),
            other => Err(DomainError::ValidationError(format!(
                "unknown output mode '{}' (expected 'buffered' or 'streaming')",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Buffered => write!(f, "buffered"),
            OutputMode::Streaming => write!(f, "streaming"),
        }
    }
}

/// Validated prediction request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub smiles: Smiles,
    /// Per-request override; the service default applies when `None`
    pub prob_thresh: Option<ProbabilityThreshold>,
}

impl PredictionRequest {
    /// Build from raw form values
    ///
    /// An empty `prob_thresh` is treated as absent.
    pub fn from_form(smiles: Option<&str>, prob_thresh: Option<&str>) -> Result<Self> {
        let smiles = Smiles::parse(smiles.unwrap_or_default())?;
        let prob_thresh = match prob_thresh.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse()?),
        };
        Ok(Self {
            smiles,
            prob_thresh,
        })
    }
}
