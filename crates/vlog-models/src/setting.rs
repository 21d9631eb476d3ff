//! Runtime configuration with optional env-var fallback.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed value a [`Setting`] can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Enum(String),
    Json(Value),
}

impl SettingValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Enum(_) => "enum",
            Self::Json(_) => "json",
        }
    }
}

/// Validation constraints applied to a write, prior to commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SettingConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Setting {
    /// Dotted key, e.g. `transcoding.hls_segment_duration`.
    pub key: String,
    pub value: SettingValue,
    pub category: String,
    #[serde(default)]
    pub constraints: SettingConstraints,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Setting {
    /// The category-stripped, uppercased env-var fallback name: `VLOG_<KEY_UPPER>`.
    ///
    /// `transcoding.hls_segment_duration` -> `VLOG_HLS_SEGMENT_DURATION`.
    pub fn env_var_name(&self) -> String {
        let without_category = self
            .key
            .strip_prefix(&format!("{}.", self.category))
            .unwrap_or(&self.key);
        format!("VLOG_{}", without_category.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_name_strips_category_prefix() {
        let setting = Setting {
            key: "transcoding.hls_segment_duration".into(),
            value: SettingValue::Int(6),
            category: "transcoding".into(),
            constraints: SettingConstraints::default(),
            updated_at: Utc::now(),
            updated_by: None,
        };
        assert_eq!(setting.env_var_name(), "VLOG_HLS_SEGMENT_DURATION");
    }
}
