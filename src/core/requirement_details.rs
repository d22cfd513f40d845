//! Human-readable summary of what a presentation definition requests.

use serde::Serialize;

use super::input_descriptor::{ConstraintsField, InputDescriptor};
use super::presentation_definition::SubmissionRequirement;
use super::registry::DescriptorRegistry;
use crate::config::Config;
use crate::utils::to_human_readable_string;

/// One submission requirement, as shown to the holder.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequirementDetail {
    pub name: String,
    pub purpose: String,
    pub rule_description: String,
    pub descriptors: Vec<DescriptorDetail>,
}

/// One input descriptor of a requirement, as shown to the holder.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorDetail {
    pub name: String,
    pub purpose: String,
    pub constraint_purposes: Vec<String>,
}

/// Describe every submission requirement of the registered definition.
///
/// A definition without submission requirements is described as a single
/// `all` requirement over every input descriptor.
pub fn explain(registry: &DescriptorRegistry, config: &Config) -> Vec<RequirementDetail> {
    let definition = registry.definition();

    if !registry.apply_rules() {
        let implicit = SubmissionRequirement::all(Vec::new());
        let descriptors = registry.input_descriptors().iter().collect::<Vec<_>>();

        return vec![RequirementDetail {
            name: definition
                .name()
                .cloned()
                .unwrap_or_else(|| default_name(0)),
            purpose: definition
                .purpose()
                .cloned()
                .unwrap_or_else(|| config.default_purpose.clone()),
            rule_description: implicit.rule_description(),
            descriptors: describe_descriptors(&descriptors, config),
        }];
    }

    registry
        .submission_requirements()
        .iter()
        .enumerate()
        .map(|(i, requirement)| RequirementDetail {
            name: requirement
                .name()
                .cloned()
                .unwrap_or_else(|| default_name(i)),
            purpose: requirement
                .purpose()
                .cloned()
                .unwrap_or_else(|| config.default_purpose.clone()),
            rule_description: requirement.rule_description(),
            descriptors: describe_descriptors(&registry.descriptors_for(requirement), config),
        })
        .collect()
}

fn default_name(index: usize) -> String {
    format!("Requested information #{}", index + 1)
}

fn describe_descriptors(descriptors: &[&InputDescriptor], config: &Config) -> Vec<DescriptorDetail> {
    descriptors
        .iter()
        .map(|descriptor| DescriptorDetail {
            name: descriptor
                .name()
                .cloned()
                .unwrap_or_else(|| to_human_readable_string(descriptor.id())),
            purpose: descriptor
                .purpose()
                .cloned()
                .unwrap_or_else(|| config.default_purpose.clone()),
            constraint_purposes: descriptor
                .constraints()
                .map(|constraints| constraints.fields())
                .unwrap_or_default()
                .iter()
                .map(constraint_purpose)
                .collect(),
        })
        .collect()
}

// Fields without a purpose are described by their name, or by the fields
// their paths point at.
fn constraint_purpose(field: &ConstraintsField) -> String {
    if let Some(purpose) = field.purpose() {
        return purpose.clone();
    }

    if let Some(name) = field.name() {
        return name.clone();
    }

    field.requested_fields_human_readable().join(", ")
}
