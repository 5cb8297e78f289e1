use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnalysisRequest {
    #[validate(length(min = 1, message = "datasource must not be empty"))]
    pub datasource: String,
    #[validate(length(min = 1, message = "dependent_variable must not be empty"))]
    pub dependent_variable: String,
    #[validate(length(min = 1, message = "x_vars must contain at least one variable"))]
    pub x_vars: Vec<String>,
    #[serde(default)]
    pub interactions: Vec<Vec<String>>,
    #[serde(default)]
    pub show_flags: BTreeMap<String, bool>,
}

/// One fitted model term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoefficientEntry {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

/// Model-level fit statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFit {
    pub coefficients: Vec<CoefficientEntry>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_statistic: Option<f64>,
    pub n_observations: usize,
    pub n_dropped: usize,
    pub residual_df: usize,
}

/// Residual spread, returned when the `diagnostics` show flag is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualDiagnostics {
    pub residual_mean: f64,
    pub residual_std: f64,
    pub residual_min: f64,
    pub residual_max: f64,
}

/// Response of `POST /analyze`: the echoed request plus the fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub datasource: String,
    pub dependent_variable: String,
    pub x_vars: Vec<String>,
    pub interactions: Vec<Vec<String>>,
    pub show_flags: BTreeMap<String, bool>,
    pub model: ModelFit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<ResidualDiagnostics>,
}
