use jsonschema::JSONSchema;
use serde_json::Value as Json;

/// A compiled `filter` of a constraints field.
///
/// Filters are JSON Schema descriptors evaluated against each value returned by
/// the field's path query.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
pub struct Filter(JSONSchema);

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter").finish_non_exhaustive()
    }
}

/// Error raised when a filter cannot be used to evaluate values.
///
/// A broken filter fails the field it belongs to, never the whole evaluation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterEvaluationError {
    #[error("filter must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("invalid filter schema: {0}")]
    InvalidSchema(String),
}

impl Filter {
    pub fn compile(filter: &Json) -> Result<Self, FilterEvaluationError> {
        if !filter.is_object() {
            return Err(FilterEvaluationError::NotAnObject(json_kind(filter)));
        }

        JSONSchema::compile(filter)
            .map(Self)
            .map_err(|e| FilterEvaluationError::InvalidSchema(e.to_string()))
    }

    pub fn is_satisfied_by(&self, value: &Json) -> bool {
        match self.0.validate(value) {
            Ok(()) => true,
            Err(errors) => {
                for error in errors {
                    tracing::debug!("value did not pass filter validation: {error}");
                }
                false
            }
        }
    }

    /// Keep the values satisfying the filter, preserving their order.
    pub fn retain<'a>(&self, values: Vec<&'a Json>) -> Vec<&'a Json> {
        values
            .into_iter()
            .filter(|value| self.is_satisfied_by(value))
            .collect()
    }
}

/// Evaluate a single `filter` against a candidate `value`.
pub fn validate(filter: &Json, value: &Json) -> Result<bool, FilterEvaluationError> {
    Filter::compile(filter).map(|f| f.is_satisfied_by(value))
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
