//! Referential validation for analysis requests
//!
//! Structural checks (non-empty fields) are handled by the `validator`
//! derive on `AnalysisRequest`; this module checks the request against the
//! resolved data source's dictionary:
//! - Variable names must be well-formed tokens
//! - Dependent and independent variables must exist in the dictionary
//! - Interaction terms may only reference variables declared in `x_vars`

use crate::domain::analysis::AnalysisRequest;
use crate::domain::dictionary::Dictionary;
use crate::domain::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static VAR_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn add_error(&mut self, code: &str, message: &str, field: Option<&str>) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            code: code.to_string(),
            message: message.to_string(),
            field: field.map(|s| s.to_string()),
        });
    }

    /// Collapse the first recorded error into the service error type.
    pub fn into_app_error(self) -> Option<AppError> {
        self.errors.into_iter().next().map(|err| AppError::InvalidRequest {
            message: err.message,
            field: err.field,
        })
    }
}

/// Validate an analysis request against the dictionary of its data source.
pub fn validate_request(request: &AnalysisRequest, dictionary: &Dictionary) -> ValidationResult {
    let mut result = ValidationResult::valid();

    check_name(&mut result, &request.dependent_variable, "dependent_variable");
    if !dictionary.contains_key(&request.dependent_variable) {
        result.add_error(
            "UNKNOWN_VARIABLE",
            &format!(
                "dependent variable '{}' does not exist in source dictionary",
                request.dependent_variable
            ),
            Some("dependent_variable"),
        );
    }

    for name in &request.x_vars {
        check_name(&mut result, name, "x_vars");
        if !dictionary.contains_key(name) {
            result.add_error(
                "UNKNOWN_VARIABLE",
                &format!("variable '{}' does not exist in source dictionary", name),
                Some("x_vars"),
            );
        }
    }

    for (index, term) in request.interactions.iter().enumerate() {
        if term.len() < 2 {
            result.add_error(
                "INTERACTION_TOO_SHORT",
                &format!(
                    "interaction term {} must combine at least two variables",
                    index
                ),
                Some("interactions"),
            );
        }
        for name in term {
            if !request.x_vars.contains(name) {
                result.add_error(
                    "INTERACTION_UNDECLARED",
                    &format!(
                        "interaction variable '{}' is not declared in x_vars",
                        name
                    ),
                    Some("interactions"),
                );
            }
        }
    }

    result
}

fn check_name(result: &mut ValidationResult, name: &str, field: &str) {
    if !VAR_NAME_PATTERN.is_match(name) {
        result.add_error(
            "INVALID_NAME",
            &format!("'{}' is not a valid variable name", name),
            Some(field),
        );
    }
}
