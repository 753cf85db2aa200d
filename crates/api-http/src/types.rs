//! Request types.

use serde::Deserialize;

/// `POST /predict` form body
///
/// Both fields are optional at this layer so a missing `smiles` is reported
/// as such rather than as a generic form error.
#[derive(Debug, Default, Deserialize)]
pub struct PredictForm {
    #[serde(default)]
    pub smiles: Option<String>,
    #[serde(default)]
    pub prob_thresh: Option<String>,
}
