//! Dictionary and category lookup
//!
//! Read-only views over a resolved data source:
//! - `get_dictionary` returns the variable dictionary file as a map
//! - `get_categories` returns the category structure, flattened so each
//!   category maps to the plain list of variables underneath it

use crate::domain::dictionary::{CategoryMap, Dictionary};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::registry::DataSourceRegistry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DictionaryService {
    registry: Arc<DataSourceRegistry>,
}

impl DictionaryService {
    pub fn new(registry: Arc<DataSourceRegistry>) -> Self {
        Self { registry }
    }

    pub async fn get_dictionary(&self, source: &str) -> Result<Dictionary> {
        let handle = self.registry.resolve(source)?;
        let raw = self
            .registry
            .store()
            .fetch_json(&handle.dictionary_key())
            .await
            .map_err(|err| match err {
                AppError::NotFound(_) => {
                    AppError::NotFound(format!("dictionary file not found for source: {}", source))
                }
                other => other,
            })?;

        let dictionary: Dictionary = serde_json::from_value(raw).map_err(|err| {
            AppError::ParseError(format!("invalid dictionary for source {}: {}", source, err))
        })?;

        if dictionary.is_empty() {
            warn!(source, "dictionary file contains no variables");
        }
        Ok(dictionary)
    }

    pub async fn get_categories(&self, source: &str) -> Result<CategoryMap> {
        let handle = self.registry.resolve(source)?;
        match self
            .registry
            .store()
            .fetch_json(&handle.categories_key())
            .await
        {
            Ok(raw) => Ok(flatten_category_tree(&raw)),
            Err(AppError::NotFound(_)) => {
                debug!(source, "category file missing, serving basic structure");
                Ok(basic_categories())
            }
            Err(other) => Err(other),
        }
    }
}

/// Flatten a hierarchical category structure. Each top-level category maps
/// to either a list of variable names or nested groups of them; nesting is
/// collapsed into a single list per category.
pub fn flatten_category_tree(value: &Value) -> CategoryMap {
    let mut flattened = BTreeMap::new();
    if let Value::Object(map) = value {
        for (category, content) in map {
            flattened.insert(category.clone(), collect_variables(content));
        }
    }
    flattened
}

fn collect_variables(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Value::Object(map) => map.values().flat_map(collect_variables).collect(),
        _ => vec![],
    }
}

/// Fallback category structure served when a registered source has no
/// category file.
pub fn basic_categories() -> CategoryMap {
    let mut categories = BTreeMap::new();
    categories.insert(
        "demographic".to_string(),
        vec!["age", "gender", "race", "education"],
    );
    categories.insert("social".to_string(), vec!["social_var1", "social_var2"]);
    categories.insert("economic".to_string(), vec!["income", "employment"]);
    categories.insert(
        "wellbeing".to_string(),
        vec!["wellbeing_var1", "wellbeing_var2"],
    );
    categories
        .into_iter()
        .map(|(name, vars)| (name, vars.into_iter().map(str::to_string).collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_plain_lists() {
        let tree = json!({
            "demographic": ["age", "gender"],
            "wellbeing": ["happy"]
        });

        let flat = flatten_category_tree(&tree);
        assert_eq!(flat["demographic"], vec!["age", "gender"]);
        assert_eq!(flat["wellbeing"], vec!["happy"]);
    }

    #[test]
    fn test_flatten_nested_groups() {
        let tree = json!({
            "demographic": {
                "basic": ["age", "gender"],
                "detailed": {
                    "ancestry": ["race", "ethnic"]
                }
            }
        });

        let flat = flatten_category_tree(&tree);
        let vars = &flat["demographic"];
        for expected in ["age", "gender", "race", "ethnic"] {
            assert!(vars.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_flatten_ignores_non_string_leaves() {
        let tree = json!({
            "demographic": ["age", 42, null]
        });

        let flat = flatten_category_tree(&tree);
        assert_eq!(flat["demographic"], vec!["age"]);
    }

    #[test]
    fn test_flatten_non_object_root_is_empty() {
        let flat = flatten_category_tree(&json!(["age"]));
        assert!(flat.is_empty());
    }

    #[test]
    fn test_basic_categories_structure() {
        let categories = basic_categories();
        assert_eq!(categories.len(), 4);
        assert!(categories["demographic"].contains(&"age".to_string()));
    }
}
