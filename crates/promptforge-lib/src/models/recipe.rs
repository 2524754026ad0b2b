// Recipe and fragment models
// Recipes are YAML files that name a model profile, an ordered fragment list and default params

use serde::Deserialize;

/// A prompt recipe
#[derive(Debug, Clone, Deserialize)]
pub struct Recipe {
    /// Model identifier the recipe targets
    pub profile: String,
    /// Fragment ids, rendered in order
    pub fragments: Vec<String>,
    /// Default placeholder values, overridden by inline params
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A reusable prompt fragment
#[derive(Debug, Clone, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub trust: Option<String>,
    #[serde(default)]
    pub merge_strategy: Option<String>,
    pub content: String,
}
