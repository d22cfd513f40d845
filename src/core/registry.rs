use std::collections::{BTreeMap, HashSet};

use serde_json::Value as Json;

use super::definition_validation;
use super::input_descriptor::{GroupId, InputDescriptor};
use super::presentation_definition::{
    DefinitionError, PresentationDefinition, SubmissionRequirement,
};

/// A validated presentation definition, indexed for evaluation.
///
/// Building a registry checks that every group named by a submission
/// requirement is carried by at least one input descriptor.
#[derive(Clone, Debug)]
pub struct DescriptorRegistry {
    definition: PresentationDefinition,
    /// Indexes into the definition's input descriptors, in definition order.
    descriptors_by_group: BTreeMap<GroupId, Vec<usize>>,
}

impl DescriptorRegistry {
    /// Validate a raw presentation definition and build its registry.
    pub fn from_json(definition: Json) -> Result<Self, DefinitionError> {
        definition_validation::validate(&definition)?;
        Self::build(PresentationDefinition::from_json(definition)?)
    }

    /// Build the registry of an already parsed presentation definition.
    pub fn build(definition: PresentationDefinition) -> Result<Self, DefinitionError> {
        let mut descriptors_by_group = BTreeMap::new();

        let available: HashSet<&str> = definition
            .input_descriptors()
            .iter()
            .flat_map(|descriptor| descriptor.groups())
            .map(String::as_str)
            .collect();

        for requirement in definition.submission_requirements().into_iter().flatten() {
            let groups = requirement
                .groups()
                .ok_or(DefinitionError::NestedRequirementUnsupported)?;

            for group in groups {
                if !available.contains(group.as_str()) {
                    return Err(DefinitionError::ReferentialIntegrity(group.clone()));
                }

                descriptors_by_group
                    .entry(group.clone())
                    .or_insert_with(|| {
                        definition
                            .input_descriptors()
                            .iter()
                            .enumerate()
                            .filter(|(_, descriptor)| descriptor.in_group(group))
                            .map(|(i, _)| i)
                            .collect()
                    });
            }
        }

        Ok(Self {
            definition,
            descriptors_by_group,
        })
    }

    pub fn definition(&self) -> &PresentationDefinition {
        &self.definition
    }

    /// Whether submission requirements drive the evaluation.
    ///
    /// Without them, every input descriptor is evaluated on its own.
    pub fn apply_rules(&self) -> bool {
        self.definition
            .submission_requirements()
            .is_some_and(|requirements| !requirements.is_empty())
    }

    pub fn input_descriptors(&self) -> &[InputDescriptor] {
        self.definition.input_descriptors()
    }

    pub fn submission_requirements(&self) -> &[SubmissionRequirement] {
        self.definition
            .submission_requirements()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Return the input descriptors of `group`, in definition order.
    pub fn descriptors_by_group(&self, group: &str) -> Vec<&InputDescriptor> {
        self.descriptors_by_group
            .get(group)
            .into_iter()
            .flatten()
            .map(|&i| &self.input_descriptors()[i])
            .collect()
    }

    /// Return the input descriptors selected by a requirement's `from` groups.
    ///
    /// Descriptors keep their definition order, and a descriptor belonging to
    /// several selected groups appears once.
    pub fn descriptors_for(&self, requirement: &SubmissionRequirement) -> Vec<&InputDescriptor> {
        let mut selected: Vec<usize> = requirement
            .groups()
            .into_iter()
            .flatten()
            .filter_map(|group| self.descriptors_by_group.get(group))
            .flatten()
            .copied()
            .collect();

        selected.sort_unstable();
        selected.dedup();

        selected
            .into_iter()
            .map(|i| &self.input_descriptors()[i])
            .collect()
    }
}
