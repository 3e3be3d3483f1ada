// Wire types for the labeling backend
//
// Shapes mirror the server's JSON exactly; projection onto domain types
// (per-category labels, id pair lists) happens in the engine, which knows
// the current category.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An element as the server sends it: labels and predictions are maps keyed
/// by category id, covering every category at once
#[derive(Debug, Clone, Deserialize)]
pub struct UnparsedElement {
    pub id: String,
    pub docid: String,
    pub text: String,
    #[serde(default)]
    pub user_labels: HashMap<String, bool>,
    #[serde(default)]
    pub model_predictions: HashMap<String, bool>,
}

/// Response of every element-retrieval endpoint. `pairs` is only present on
/// the contradiction endpoint; `hit_count` is authoritative the moment it
/// arrives.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementsResponse {
    #[serde(default)]
    pub elements: Vec<UnparsedElement>,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default)]
    pub pairs: Option<Vec<(UnparsedElement, UnparsedElement)>>,
}

/// Response of the `iterations` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct IterationsResponse {
    #[serde(default)]
    pub iterations: Vec<crate::model_status::ModelIteration>,
}

/// Response of the `categories` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CategoriesResponse {
    #[serde(default)]
    pub categories: Vec<crate::elements::Category>,
}

/// Body of `PUT element/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct LabelUpdate {
    pub category_id: u32,
    /// "true" | "false" | "none"
    pub value: &'static str,
    pub update_counter: bool,
}

/// Body of the precision-evaluation submit POST
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSubmission {
    pub ids: Vec<String>,
    pub iteration: u32,
    pub changed_elements_count: u64,
}

/// Response of the precision-evaluation submit POST
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationResult {
    pub score: f64,
}
