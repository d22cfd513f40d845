//! Matching of credentials against a registered presentation definition.
//!
//! Without submission requirements every input descriptor is checked on its
//! own. Otherwise each requirement is applied in definition order to the
//! descriptors of its `from` groups.

use super::credential::{Credential, ResolvedCredential};
use super::input_descriptor::InputDescriptor;
use super::presentation_definition::SubmissionRequirement;
use super::registry::DescriptorRegistry;

/// One credential filling one input descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchResult<'a> {
    pub credential: &'a Credential,
    pub descriptor_id: &'a str,
    pub is_manifest_match: bool,
}

/// Something that can be offered for an input descriptor.
trait Candidate {
    const IS_MANIFEST: bool;

    fn credential(&self) -> &Credential;

    fn fills(&self, descriptor: &InputDescriptor) -> bool;
}

impl Candidate for ResolvedCredential {
    const IS_MANIFEST: bool = false;

    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn fills(&self, descriptor: &InputDescriptor) -> bool {
        descriptor.matches(&self.credential, &self.types)
    }
}

impl Candidate for Credential {
    const IS_MANIFEST: bool = true;

    fn credential(&self) -> &Credential {
        self
    }

    fn fills(&self, descriptor: &InputDescriptor) -> bool {
        self.as_manifest()
            .is_some_and(|manifest| descriptor.matches_manifest(manifest))
    }
}

/// Evaluate concrete credentials, then manifests as a fallback, against the
/// registered definition.
///
/// Results are ordered by requirement (or descriptor, without requirements),
/// then by credential, then by descriptor within the requirement's groups.
pub fn evaluate<'a>(
    credentials: &'a [ResolvedCredential],
    manifests: Option<&'a [Credential]>,
    registry: &'a DescriptorRegistry,
) -> Vec<MatchResult<'a>> {
    if !registry.apply_rules() {
        return registry
            .input_descriptors()
            .iter()
            .flat_map(|descriptor| {
                let results = match_descriptor(descriptor, credentials);
                match manifests {
                    Some(manifests) if results.is_empty() => {
                        match_descriptor(descriptor, manifests)
                    }
                    _ => results,
                }
            })
            .collect();
    }

    registry
        .submission_requirements()
        .iter()
        .flat_map(|requirement| {
            let descriptors = registry.descriptors_for(requirement);
            let results = match_requirement(requirement, &descriptors, credentials);
            match manifests {
                Some(manifests) if results.is_empty() => {
                    tracing::debug!(
                        "no credential fulfils requirement `{}`, trying manifests",
                        requirement.rule_description()
                    );
                    match_requirement(requirement, &descriptors, manifests)
                }
                _ => results,
            }
        })
        .collect()
}

fn match_descriptor<'a, C: Candidate>(
    descriptor: &'a InputDescriptor,
    candidates: &'a [C],
) -> Vec<MatchResult<'a>> {
    candidates
        .iter()
        .filter(|candidate| candidate.fills(descriptor))
        .map(|candidate| MatchResult {
            credential: candidate.credential(),
            descriptor_id: descriptor.id(),
            is_manifest_match: C::IS_MANIFEST,
        })
        .collect()
}

fn match_requirement<'a, C: Candidate>(
    requirement: &SubmissionRequirement,
    descriptors: &[&'a InputDescriptor],
    candidates: &'a [C],
) -> Vec<MatchResult<'a>> {
    let mut results = Vec::new();

    for candidate in candidates {
        let matched: Vec<&InputDescriptor> = descriptors
            .iter()
            .copied()
            .filter(|descriptor| candidate.fills(descriptor))
            .collect();

        // A rule satisfied by zero matches (e.g. `max` alone) contributes nothing.
        if matched.is_empty() || !requirement.is_satisfied_by(matched.len(), descriptors.len()) {
            continue;
        }

        results.extend(matched.into_iter().map(|descriptor| MatchResult {
            credential: candidate.credential(),
            descriptor_id: descriptor.id(),
            is_manifest_match: C::IS_MANIFEST,
        }));
    }

    results
}
