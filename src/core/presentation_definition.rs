use super::input_descriptor::*;
use crate::utils::OneOrMany;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A presentation definition is a JSON object that describes the information a [Verifier](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:verifier) requires of a [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder).
///
/// Presentation Definitions are composed of inputs, which describe the forms and details of the
/// proofs they require, and optional sets of selection rules, to allow [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder)s flexibility
/// in cases where different types of proofs may satisfy an input requirement.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v1.0.0/#presentation-definition)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    input_descriptors: Vec<InputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_requirements: Option<Vec<SubmissionRequirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
}

impl PresentationDefinition {
    /// The Presentation Definition MUST contain an input_descriptors property. Its value MUST be an array of Input Descriptor Objects,
    /// the composition of which are found [InputDescriptor] type.
    pub fn new(input_descriptor: InputDescriptor) -> Self {
        Self {
            id: None,
            input_descriptors: vec![input_descriptor],
            submission_requirements: None,
            name: None,
            purpose: None,
        }
    }

    /// Parse a presentation definition, reporting the JSON path of the
    /// offending member on failure.
    pub fn from_json(value: Json) -> Result<Self, DefinitionError> {
        serde_path_to_error::deserialize(value).map_err(|e| DefinitionError::Parse {
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })
    }

    pub fn set_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    /// Return the id of the presentation definition.
    pub fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    /// Add a new input descriptor to the presentation definition.
    pub fn add_input_descriptors(mut self, input_descriptor: InputDescriptor) -> Self {
        self.input_descriptors.push(input_descriptor);
        self
    }

    /// Return the input descriptors of the presentation definition.
    pub fn input_descriptors(&self) -> &Vec<InputDescriptor> {
        &self.input_descriptors
    }

    /// Add a submission requirement to the presentation definition.
    pub fn add_submission_requirement(mut self, requirement: SubmissionRequirement) -> Self {
        self.submission_requirements
            .get_or_insert_with(Vec::new)
            .push(requirement);
        self
    }

    /// Return the submission requirements, if any.
    pub fn submission_requirements(&self) -> Option<&Vec<SubmissionRequirement>> {
        self.submission_requirements.as_ref()
    }

    /// Set the name of the presentation definition.
    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Return the name of the presentation definition.
    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the purpose of the presentation definition.
    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    /// Return the purpose of the presentation definition.
    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }
}

/// A single structural problem found in a presentation definition.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct SchemaViolation {
    /// JSON pointer to the offending member.
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while registering a presentation definition.
///
/// They are all raised before any credential is evaluated.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("presentation definition is invalid: {}", display_violations(.0))]
    SchemaViolation(Vec<SchemaViolation>),

    #[error("failed to parse presentation definition at `{path}`: {message}")]
    Parse { path: String, message: String },

    #[error("submission requirement references group `{0}` which no input descriptor belongs to")]
    ReferentialIntegrity(GroupId),

    #[error("nested submission requirements (`from_nested`) are not implemented")]
    NestedRequirementUnsupported,
}

fn display_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SubmissionRequirementObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SubmissionRequirementBase {
    From {
        from: OneOrMany<GroupId>,
        #[serde(flatten)]
        submission_requirement_base: SubmissionRequirementObject,
    },
    FromNested {
        from_nested: Vec<SubmissionRequirement>,
        #[serde(flatten)]
        submission_requirement_base: SubmissionRequirementObject,
    },
}

impl SubmissionRequirementBase {
    pub fn from(groups: Vec<GroupId>) -> Self {
        Self::From {
            from: OneOrMany::Many(groups),
            submission_requirement_base: SubmissionRequirementObject {
                name: None,
                purpose: None,
            },
        }
    }

    fn object(&self) -> &SubmissionRequirementObject {
        match self {
            Self::From {
                submission_requirement_base,
                ..
            }
            | Self::FromNested {
                submission_requirement_base,
                ..
            } => submission_requirement_base,
        }
    }

    fn object_mut(&mut self) -> &mut SubmissionRequirementObject {
        match self {
            Self::From {
                submission_requirement_base,
                ..
            }
            | Self::FromNested {
                submission_requirement_base,
                ..
            } => submission_requirement_base,
        }
    }
}

/// Submission Requirements are quantified rules over groups of input descriptors.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#submission-requirements](https://identity.foundation/presentation-exchange/spec/v1.0.0/#submission-requirements)
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SubmissionRequirement {
    All(SubmissionRequirementBase),
    Pick(SubmissionRequirementPick),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SubmissionRequirementPick {
    #[serde(flatten)]
    pub submission_requirement: SubmissionRequirementBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

impl SubmissionRequirement {
    /// An `all` requirement over the given groups.
    pub fn all(groups: Vec<GroupId>) -> Self {
        Self::All(SubmissionRequirementBase::from(groups))
    }

    /// A `pick` requirement over the given groups, with no bound set yet.
    pub fn pick(groups: Vec<GroupId>) -> Self {
        Self::Pick(SubmissionRequirementPick {
            submission_requirement: SubmissionRequirementBase::from(groups),
            count: None,
            min: None,
            max: None,
        })
    }

    /// Set the `count` of a `pick` requirement. No effect on `all`.
    pub fn set_count(mut self, count: u64) -> Self {
        if let Self::Pick(pick) = &mut self {
            pick.count = Some(count);
        }
        self
    }

    /// Set the `min` of a `pick` requirement. No effect on `all`.
    pub fn set_min(mut self, min: u64) -> Self {
        if let Self::Pick(pick) = &mut self {
            pick.min = Some(min);
        }
        self
    }

    /// Set the `max` of a `pick` requirement. No effect on `all`.
    pub fn set_max(mut self, max: u64) -> Self {
        if let Self::Pick(pick) = &mut self {
            pick.max = Some(max);
        }
        self
    }

    pub fn set_name(mut self, name: String) -> Self {
        self.base_mut().object_mut().name = Some(name);
        self
    }

    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.base_mut().object_mut().purpose = Some(purpose);
        self
    }

    pub fn base(&self) -> &SubmissionRequirementBase {
        match self {
            Self::All(base) => base,
            Self::Pick(pick) => &pick.submission_requirement,
        }
    }

    fn base_mut(&mut self) -> &mut SubmissionRequirementBase {
        match self {
            Self::All(base) => base,
            Self::Pick(pick) => &mut pick.submission_requirement,
        }
    }

    pub fn name(&self) -> Option<&String> {
        self.base().object().name.as_ref()
    }

    pub fn purpose(&self) -> Option<&String> {
        self.base().object().purpose.as_ref()
    }

    /// Return the groups selected by `from`, or `None` for nested requirements.
    pub fn groups(&self) -> Option<&[GroupId]> {
        match self.base() {
            SubmissionRequirementBase::From { from, .. } => Some(from.as_slice()),
            SubmissionRequirementBase::FromNested { .. } => None,
        }
    }

    /// Return whether `matched` input descriptors out of the `available` ones
    /// of the group satisfy the rule.
    ///
    /// `all` needs every descriptor of the group. `pick` looks at `count`
    /// (as a lower bound) first, then at `min` and `max` together, then at
    /// `max` alone, then at `min` alone.
    pub fn is_satisfied_by(&self, matched: usize, available: usize) -> bool {
        let matched = matched as u64;

        match self {
            Self::All(_) => matched == available as u64,
            Self::Pick(SubmissionRequirementPick {
                count, min, max, ..
            }) => match (count, min, max) {
                (Some(count), _, _) => matched >= *count,
                (None, Some(min), Some(max)) => (*min..=*max).contains(&matched),
                (None, None, Some(max)) => matched <= *max,
                (None, Some(min), None) => matched >= *min,
                (None, None, None) => false,
            },
        }
    }

    /// Describe the rule in a sentence suitable for display.
    pub fn rule_description(&self) -> String {
        match self {
            Self::All(_) => "all conditions should be met".to_string(),
            Self::Pick(SubmissionRequirementPick {
                count, min, max, ..
            }) => match (count, min, max) {
                (Some(count), _, _) => format!("at least {count} condition(s) should be met"),
                (None, Some(min), Some(max)) => format!("{min} to {max} conditions should be met"),
                (None, None, Some(max)) => format!("at most {max} condition(s) should be met"),
                (None, Some(min), None) => format!("at least {min} condition(s) should be met"),
                (None, None, None) => "any number of conditions may be met".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_requirements() {
        let requirements: Vec<SubmissionRequirement> = serde_json::from_value(json!([
            { "name": "Citizenship", "rule": "all", "from": "A" },
            { "rule": "pick", "count": 1, "from": ["B", "C"] },
            { "rule": "pick", "min": 1, "max": 2, "from_nested": [
                { "rule": "all", "from": "A" }
            ] }
        ]))
        .unwrap();

        assert_eq!(requirements[0].name().unwrap(), "Citizenship");
        assert_eq!(requirements[0].groups().unwrap(), ["A"]);
        assert_eq!(requirements[1].groups().unwrap(), ["B", "C"]);
        assert!(requirements[2].groups().is_none());
        assert!(matches!(
            &requirements[1],
            SubmissionRequirement::Pick(SubmissionRequirementPick { count: Some(1), .. })
        ));
    }

    #[test]
    fn all_rule() {
        let rule = SubmissionRequirement::all(vec!["A".into()]);
        assert!(rule.is_satisfied_by(3, 3));
        assert!(!rule.is_satisfied_by(2, 3));
    }

    #[test]
    fn pick_count_is_a_lower_bound() {
        let rule = SubmissionRequirement::pick(vec!["A".into()]).set_count(1);
        assert!(!rule.is_satisfied_by(0, 3));
        assert!(rule.is_satisfied_by(1, 3));
        assert!(rule.is_satisfied_by(2, 3));
    }

    #[test]
    fn pick_precedence() {
        // `count` wins over `min` and `max`.
        let rule = SubmissionRequirement::pick(vec!["A".into()])
            .set_count(2)
            .set_max(1);
        assert!(rule.is_satisfied_by(3, 3));

        let range = SubmissionRequirement::pick(vec!["A".into()])
            .set_min(1)
            .set_max(2);
        assert!(!range.is_satisfied_by(0, 3));
        assert!(range.is_satisfied_by(2, 3));
        assert!(!range.is_satisfied_by(3, 3));

        let max = SubmissionRequirement::pick(vec!["A".into()]).set_max(2);
        assert!(max.is_satisfied_by(1, 3));
        assert!(!max.is_satisfied_by(3, 3));

        let min = SubmissionRequirement::pick(vec!["A".into()]).set_min(2);
        assert!(!min.is_satisfied_by(1, 3));
        assert!(min.is_satisfied_by(3, 3));
    }

    #[test]
    fn rule_descriptions() {
        assert_eq!(
            SubmissionRequirement::all(vec!["A".into()]).rule_description(),
            "all conditions should be met"
        );
        assert_eq!(
            SubmissionRequirement::pick(vec!["A".into()])
                .set_count(1)
                .rule_description(),
            "at least 1 condition(s) should be met"
        );
        assert_eq!(
            SubmissionRequirement::pick(vec!["A".into()])
                .set_min(1)
                .set_max(3)
                .rule_description(),
            "1 to 3 conditions should be met"
        );
        assert_eq!(
            SubmissionRequirement::pick(vec!["A".into()])
                .set_max(2)
                .rule_description(),
            "at most 2 condition(s) should be met"
        );
        assert_eq!(
            SubmissionRequirement::pick(vec!["A".into()])
                .set_min(2)
                .rule_description(),
            "at least 2 condition(s) should be met"
        );
    }

    #[test]
    fn parse_error_names_the_path() {
        let err = PresentationDefinition::from_json(json!({
            "input_descriptors": [{ "id": "a", "schema": [{ "uri": 42 }] }]
        }))
        .unwrap_err();

        match err {
            DefinitionError::Parse { path, .. } => {
                assert_eq!(path, "input_descriptors[0].schema[0].uri")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
