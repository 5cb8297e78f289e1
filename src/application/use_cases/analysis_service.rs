//! Analysis execution
//!
//! Orchestrates `/analyze`: structural validation, referential validation
//! against the source dictionary, observation loading with listwise
//! deletion, interaction-column expansion, and the OLS fit.

use crate::application::use_cases::dictionary_service::DictionaryService;
use crate::application::use_cases::regression::{fit_ols, Term};
use crate::application::use_cases::request_validator::validate_request;
use crate::domain::analysis::{AnalysisRequest, AnalysisResult, ModelFit};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::registry::DataSourceRegistry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

const SHOW_SUMMARY: &str = "summary";
const SHOW_DIAGNOSTICS: &str = "diagnostics";

pub struct AnalysisService {
    registry: Arc<DataSourceRegistry>,
    dictionaries: DictionaryService,
}

impl AnalysisService {
    pub fn new(registry: Arc<DataSourceRegistry>) -> Self {
        Self {
            dictionaries: DictionaryService::new(registry.clone()),
            registry,
        }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        request.validate().map_err(structural_error)?;

        let handle = self.registry.resolve(&request.datasource)?;
        let dictionary = self.dictionaries.get_dictionary(&request.datasource).await?;

        if let Some(err) = validate_request(request, &dictionary).into_app_error() {
            return Err(err);
        }

        let raw = self
            .registry
            .store()
            .fetch_json(&handle.data_key())
            .await
            .map_err(|err| match err {
                AppError::NotFound(_) => AppError::NotFound(format!(
                    "observation data not found for source: {}",
                    request.datasource
                )),
                other => other,
            })?;
        let rows = raw.as_array().ok_or_else(|| {
            AppError::ParseError(format!(
                "observation data for source {} must be an array of records",
                request.datasource
            ))
        })?;

        let (columns, n_dropped) = extract_columns(request, rows);

        let y = columns
            .get(request.dependent_variable.as_str())
            .cloned()
            .unwrap_or_default();

        let mut terms: Vec<Term> = request
            .x_vars
            .iter()
            .map(|name| Term::new(name.clone(), columns[name.as_str()].clone()))
            .collect();
        for interaction in &request.interactions {
            terms.push(interaction_term(interaction, &columns));
        }

        let fit = fit_ols(&terms, &y)?;
        let mut model = fit.model.clone();
        model.n_dropped = n_dropped;

        info!(
            source = %request.datasource,
            dependent = %request.dependent_variable,
            n_observations = model.n_observations,
            n_dropped,
            "analysis complete"
        );

        let summary = show_flag(request, SHOW_SUMMARY).then(|| format_summary(request, &model));
        let diagnostics = show_flag(request, SHOW_DIAGNOSTICS).then(|| fit.diagnostics());

        Ok(AnalysisResult {
            datasource: request.datasource.clone(),
            dependent_variable: request.dependent_variable.clone(),
            x_vars: request.x_vars.clone(),
            interactions: request.interactions.clone(),
            show_flags: request.show_flags.clone(),
            model,
            summary,
            diagnostics,
        })
    }
}

fn structural_error(errors: validator::ValidationErrors) -> AppError {
    let field_errors = errors.field_errors();
    let (field, errs) = match field_errors.iter().next() {
        Some((field, errs)) => (*field, *errs),
        None => return AppError::invalid_request("request failed validation", None),
    };
    let message = errs
        .first()
        .and_then(|err| err.message.clone())
        .map(|msg| msg.to_string())
        .unwrap_or_else(|| format!("{} is invalid", field));
    AppError::InvalidRequest {
        message,
        field: Some(field.to_string()),
    }
}

/// Extract one numeric column per used variable, dropping rows where any
/// used variable is missing or non-numeric (listwise deletion). Returns the
/// columns and the number of dropped rows.
fn extract_columns<'a>(
    request: &'a AnalysisRequest,
    rows: &[Value],
) -> (BTreeMap<&'a str, Vec<f64>>, usize) {
    let mut used: Vec<&str> = vec![request.dependent_variable.as_str()];
    for name in &request.x_vars {
        if !used.contains(&name.as_str()) {
            used.push(name.as_str());
        }
    }

    let mut columns: BTreeMap<&str, Vec<f64>> =
        used.iter().map(|name| (*name, Vec::new())).collect();
    let mut n_dropped = 0;

    for row in rows {
        let Some(record) = row.as_object() else {
            n_dropped += 1;
            continue;
        };
        let values: Vec<Option<f64>> = used
            .iter()
            .map(|name| record.get(*name).and_then(numeric_value))
            .collect();
        if values.iter().all(Option::is_some) {
            for (name, value) in used.iter().zip(values) {
                columns.get_mut(name).unwrap().push(value.unwrap());
            }
        } else {
            n_dropped += 1;
        }
    }

    (columns, n_dropped)
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Component-wise product column for an interaction term. Components are
/// guaranteed by validation to be declared in `x_vars`.
fn interaction_term(components: &[String], columns: &BTreeMap<&str, Vec<f64>>) -> Term {
    let name = components.join(":");
    let n = components
        .first()
        .and_then(|c| columns.get(c.as_str()))
        .map(|col| col.len())
        .unwrap_or(0);
    let values = (0..n)
        .map(|i| {
            components
                .iter()
                .map(|c| columns[c.as_str()][i])
                .product::<f64>()
        })
        .collect();
    Term::new(name, values)
}

fn show_flag(request: &AnalysisRequest, flag: &str) -> bool {
    request.show_flags.get(flag).copied().unwrap_or(false)
}

fn format_summary(request: &AnalysisRequest, model: &ModelFit) -> String {
    let mut rhs: Vec<String> = request.x_vars.clone();
    rhs.extend(request.interactions.iter().map(|term| term.join(":")));

    let mut out = format!(
        "OLS regression: {} ~ {}\n\n",
        request.dependent_variable,
        rhs.join(" + ")
    );
    out.push_str(&format!(
        "{:<20} {:>12} {:>12} {:>10} {:>10}\n",
        "term", "estimate", "std.err", "t value", "p value"
    ));
    for coef in &model.coefficients {
        out.push_str(&format!(
            "{:<20} {:>12.4} {:>12.4} {:>10.3} {:>10.3}\n",
            coef.term, coef.estimate, coef.std_error, coef.t_value, coef.p_value
        ));
    }
    out.push_str(&format!(
        "\nn={} (dropped {})  R-squared={:.4}  adj R-squared={:.4}",
        model.n_observations, model.n_dropped, model.r_squared, model.adj_r_squared
    ));
    if let Some(f) = model.f_statistic {
        out.push_str(&format!("  F={:.3}", f));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_request(x_vars: &[&str]) -> AnalysisRequest {
        AnalysisRequest {
            datasource: "gss".to_string(),
            dependent_variable: "happy".to_string(),
            x_vars: x_vars.iter().map(|s| s.to_string()).collect(),
            interactions: vec![],
            show_flags: BTreeMap::new(),
        }
    }

    #[test]
    fn test_extract_columns_listwise_deletion() {
        let request = test_request(&["age"]);
        let rows = vec![
            json!({"happy": 1.0, "age": 20}),
            json!({"happy": 2.0, "age": null}),
            json!({"happy": null, "age": 30}),
            json!({"happy": 3.0, "age": 40}),
        ];

        let (columns, n_dropped) = extract_columns(&request, &rows);
        assert_eq!(columns["happy"], vec![1.0, 3.0]);
        assert_eq!(columns["age"], vec![20.0, 40.0]);
        assert_eq!(n_dropped, 2);
    }

    #[test]
    fn test_extract_columns_parses_numeric_strings() {
        let request = test_request(&["age"]);
        let rows = vec![
            json!({"happy": "1.5", "age": "20"}),
            json!({"happy": "abc", "age": 30}),
        ];

        let (columns, n_dropped) = extract_columns(&request, &rows);
        assert_eq!(columns["happy"], vec![1.5]);
        assert_eq!(n_dropped, 1);
    }

    #[test]
    fn test_extract_columns_duplicate_x_var() {
        let mut request = test_request(&["age", "age"]);
        request.dependent_variable = "happy".to_string();
        let rows = vec![json!({"happy": 1.0, "age": 20})];

        let (columns, _) = extract_columns(&request, &rows);
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn test_interaction_term_is_product() {
        let mut columns: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        columns.insert("a", vec![1.0, 2.0, 3.0]);
        columns.insert("b", vec![4.0, 5.0, 6.0]);

        let term = interaction_term(&["a".to_string(), "b".to_string()], &columns);
        assert_eq!(term.name, "a:b");
        assert_eq!(term.values, vec![4.0, 10.0, 18.0]);
    }

    #[test]
    fn test_structural_error_names_field() {
        let request = AnalysisRequest {
            datasource: "gss".to_string(),
            dependent_variable: "happy".to_string(),
            x_vars: vec![],
            interactions: vec![],
            show_flags: BTreeMap::new(),
        };

        let err = structural_error(request.validate().unwrap_err());
        match err {
            AppError::InvalidRequest { field, .. } => {
                assert_eq!(field.as_deref(), Some("x_vars"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_format_summary_lists_terms() {
        let mut request = test_request(&["age", "educ"]);
        request.interactions = vec![vec!["age".to_string(), "educ".to_string()]];
        let model = ModelFit {
            coefficients: vec![],
            r_squared: 0.25,
            adj_r_squared: 0.24,
            f_statistic: Some(10.0),
            n_observations: 100,
            n_dropped: 3,
            residual_df: 96,
        };

        let summary = format_summary(&request, &model);
        assert!(summary.contains("happy ~ age + educ + age:educ"));
        assert!(summary.contains("n=100 (dropped 3)"));
        assert!(summary.contains("F=10.000"));
    }
}
