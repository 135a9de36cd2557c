use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rule configuration attached to a field descriptor. Absent rules are not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    pub required_data: Option<RequiredRule>,
    pub length_data: Option<LengthRule>,
    pub range_data: Option<RangeRule>,
    pub patterns: Vec<PatternRule>,
    /// JSON Schema fragment the submitted value must satisfy.
    pub schema: Option<Value>,
    pub expected_message: Option<String>,
    pub format_message: Option<String>,
}

impl ValidationOptions {
    pub fn is_required(&self) -> bool {
        self.required_data.as_ref().is_some_and(|rule| rule.required)
    }

    pub fn required() -> Self {
        Self {
            required_data: Some(RequiredRule {
                required: true,
                message: None,
            }),
            ..Self::default()
        }
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.length_data = Some(LengthRule {
            min,
            max,
            message: None,
        });
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.range_data = Some(RangeRule {
            min,
            max,
            message: None,
        });
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>, message: Option<String>) -> Self {
        self.patterns.push(PatternRule {
            pattern: pattern.into(),
            message,
        });
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequiredRule {
    pub required: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LengthRule {
    #[serde(default)]
    pub min: Option<usize>,
    #[serde(default)]
    pub max: Option<usize>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RangeRule {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatternRule {
    pub pattern: String,
    #[serde(default)]
    pub message: Option<String>,
}
