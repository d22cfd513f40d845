//! Structural validation of raw presentation definitions.
//!
//! A definition is checked in two stages. The first validates the document
//! against an embedded JSON Schema; the second checks what the schema cannot
//! express, i.e. `max > min` on pick rules and unique input descriptor ids.
//! Validation stops at the first failing stage.

use std::collections::HashSet;

use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::Value as Json;

use super::presentation_definition::{DefinitionError, SchemaViolation};

static DEFINITION_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    let schema: Json = serde_json::from_str(include_str!("schemas/presentation_definition.json"))
        // SAFETY: the embedded schema is a static, valid JSON document.
        .unwrap();

    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        // SAFETY: the embedded schema is a valid draft-07 schema.
        .unwrap()
});

/// Validate a raw presentation definition.
///
/// On failure, every violation found by the failing stage is reported.
pub fn validate(definition: &Json) -> Result<(), DefinitionError> {
    validate_structure(definition)?;
    validate_semantics(definition)
}

fn validate_structure(definition: &Json) -> Result<(), DefinitionError> {
    let violations: Vec<SchemaViolation> = match DEFINITION_SCHEMA.validate(definition) {
        Ok(()) => return Ok(()),
        Err(errors) => errors
            .map(|error| SchemaViolation::new(error.instance_path.to_string(), error.to_string()))
            .collect(),
    };

    Err(DefinitionError::SchemaViolation(violations))
}

fn validate_semantics(definition: &Json) -> Result<(), DefinitionError> {
    let mut violations = Vec::new();

    let mut ids = HashSet::new();
    let descriptors = definition
        .get("input_descriptors")
        .and_then(Json::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for (i, descriptor) in descriptors.iter().enumerate() {
        if let Some(id) = descriptor.get("id").and_then(Json::as_str) {
            if !ids.insert(id) {
                violations.push(SchemaViolation::new(
                    format!("/input_descriptors/{i}/id"),
                    format!("duplicate input descriptor id `{id}`"),
                ));
            }
        }
    }

    if let Some(requirements) = definition
        .get("submission_requirements")
        .and_then(Json::as_array)
    {
        check_requirement_bounds(requirements, "/submission_requirements", &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DefinitionError::SchemaViolation(violations))
    }
}

fn check_requirement_bounds(
    requirements: &[Json],
    pointer: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    for (i, requirement) in requirements.iter().enumerate() {
        let pointer = format!("{pointer}/{i}");

        let min = requirement.get("min").and_then(Json::as_u64);
        let max = requirement.get("max").and_then(Json::as_u64);

        if let (Some(min), Some(max)) = (min, max) {
            if max <= min {
                violations.push(SchemaViolation::new(
                    pointer.clone(),
                    format!("`max` ({max}) must be greater than `min` ({min})"),
                ));
            }
        }

        if let Some(nested) = requirement.get("from_nested").and_then(Json::as_array) {
            check_requirement_bounds(nested, &format!("{pointer}/from_nested"), violations);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn violations(definition: Json) -> Vec<SchemaViolation> {
        match validate(&definition) {
            Err(DefinitionError::SchemaViolation(violations)) => violations,
            other => panic!("expected schema violations, got {other:?}"),
        }
    }

    fn descriptor(id: &str) -> Json {
        json!({ "id": id, "schema": [{ "uri": "https://w3id.org/citizenship/v1" }] })
    }

    #[test]
    fn valid_definition() {
        let definition = json!({
            "id": "32f54163-7166-48f1-93d8-ff217bdb0653",
            "submission_requirements": [
                { "name": "Citizenship", "rule": "all", "from": "A" },
                { "rule": "pick", "min": 1, "max": 2, "from": ["B"] }
            ],
            "input_descriptors": [
                {
                    "id": "citizenship_input_1",
                    "group": ["A"],
                    "schema": [{ "uri": "https://w3id.org/citizenship/v1", "required": true }],
                    "constraints": {
                        "fields": [{
                            "path": ["$.credentialSubject.birthCountry"],
                            "filter": { "type": "string", "const": "Bahamas" }
                        }]
                    }
                },
                {
                    "id": "vaccination_input",
                    "group": ["B"],
                    "schema": [{ "uri": "https://w3id.org/vaccination/v1" }]
                }
            ]
        });

        validate(&definition).unwrap();
    }

    #[test]
    fn missing_input_descriptors() {
        let found = violations(json!({ "submission_requirements": [] }));
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("input_descriptors"));
    }

    #[test]
    fn empty_input_descriptors() {
        let found = violations(json!({ "input_descriptors": [] }));
        assert_eq!(found[0].path, "/input_descriptors");
    }

    #[test]
    fn descriptor_without_schema() {
        let found = violations(json!({ "input_descriptors": [{ "id": "a" }] }));
        assert_eq!(found[0].path, "/input_descriptors/0");
        assert!(found[0].message.contains("schema"));
    }

    #[test]
    fn schema_entry_without_uri() {
        let found = violations(json!({
            "input_descriptors": [{ "id": "a", "schema": [{ "required": true }] }]
        }));
        assert_eq!(found[0].path, "/input_descriptors/0/schema/0");
    }

    #[test]
    fn constraints_fields() {
        let found = violations(json!({
            "input_descriptors": [{
                "id": "a",
                "schema": [{ "uri": "https://w3id.org/citizenship/v1" }],
                "constraints": { "fields": [] }
            }]
        }));
        assert_eq!(found[0].path, "/input_descriptors/0/constraints/fields");

        let found = violations(json!({
            "input_descriptors": [{
                "id": "a",
                "schema": [{ "uri": "https://w3id.org/citizenship/v1" }],
                "constraints": { "fields": [{ "purpose": "no path" }] }
            }]
        }));
        assert_eq!(found[0].path, "/input_descriptors/0/constraints/fields/0");
    }

    #[test]
    fn malformed_filter_is_left_to_matching() {
        validate(&json!({
            "input_descriptors": [{
                "id": "a",
                "schema": [{ "uri": "https://w3id.org/citizenship/v1" }],
                "constraints": {
                    "fields": [{ "path": ["$.credentialSubject.birthCountry"], "filter": "Bahamas" }]
                }
            }]
        }))
        .unwrap();
    }

    #[test]
    fn requirement_without_from() {
        violations(json!({
            "submission_requirements": [{ "rule": "all" }],
            "input_descriptors": [descriptor("a")]
        }));
    }

    #[test]
    fn pick_without_bounds() {
        violations(json!({
            "submission_requirements": [{ "rule": "pick", "from": "A" }],
            "input_descriptors": [descriptor("a")]
        }));
    }

    #[test]
    fn numeric_bounds() {
        violations(json!({
            "submission_requirements": [{ "rule": "pick", "count": 0, "from": "A" }],
            "input_descriptors": [descriptor("a")]
        }));
        violations(json!({
            "submission_requirements": [{ "rule": "pick", "max": 0, "from": "A" }],
            "input_descriptors": [descriptor("a")]
        }));

        let found = violations(json!({
            "submission_requirements": [{ "rule": "pick", "min": 2, "max": 2, "from": "A" }],
            "input_descriptors": [descriptor("a")]
        }));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/submission_requirements/0");
    }

    #[test]
    fn nested_bounds() {
        let found = violations(json!({
            "submission_requirements": [{
                "rule": "all",
                "from_nested": [{ "rule": "pick", "min": 3, "max": 1, "from": "A" }]
            }],
            "input_descriptors": [descriptor("a")]
        }));
        assert_eq!(found[0].path, "/submission_requirements/0/from_nested/0");
    }

    #[test]
    fn duplicate_descriptor_ids() {
        let found = violations(json!({
            "input_descriptors": [descriptor("a"), descriptor("b"), descriptor("a")]
        }));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/input_descriptors/2/id");
    }

    #[test]
    fn nested_requirements_are_structurally_valid() {
        validate(&json!({
            "submission_requirements": [{
                "rule": "pick",
                "count": 1,
                "from_nested": [{ "rule": "all", "from": "A" }]
            }],
            "input_descriptors": [descriptor("a")]
        }))
        .unwrap();
    }
}
