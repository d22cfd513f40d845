use std::collections::HashMap;

use super::evaluation::MatchResult;
use super::input_descriptor::JsonPath;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A DescriptorMapId is the id of the input descriptor a submitted credential fills.
pub type DescriptorMapId = String;

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const PRESENTATION_SUBMISSION_CONTEXT: &str =
    "https://identity.foundation/presentation-exchange/submission/v1";

const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";
const PRESENTATION_SUBMISSION_TYPE: &str = "PresentationSubmission";

/// An unsigned Verifiable Presentation carrying the credentials selected for
/// a presentation definition.
///
/// The `i`-th descriptor map entry always points at the `i`-th credential:
///
/// ```json
/// {
///   "@context": [...],
///   "type": ["VerifiablePresentation", "PresentationSubmission"],
///   "presentationSubmission": {
///     "descriptorMap": [{ "id": "citizenship_input_1", "path": "$.verifiableCredential[0]" }]
///   },
///   "verifiableCredential": [{ ... }]
/// }
/// ```
///
/// Signing the presentation is left to the caller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresentationSubmission {
    #[serde(rename = "@context")]
    context: Vec<String>,
    #[serde(rename = "type")]
    types: Vec<String>,
    presentation_submission: DescriptorMapping,
    verifiable_credential: Vec<Json>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct DescriptorMapping {
    descriptor_map: Vec<DescriptorMap>,
}

impl PresentationSubmission {
    /// Build the submission of the given match results, in order.
    ///
    /// A credential matching several descriptors is submitted once per match.
    pub fn assemble(results: &[MatchResult<'_>]) -> Self {
        let (descriptor_map, verifiable_credential): (Vec<_>, Vec<_>) = results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                (
                    DescriptorMap::new(result.descriptor_id, i),
                    result.credential.document().clone(),
                )
            })
            .unzip();

        Self {
            context: vec![
                CREDENTIALS_V1_CONTEXT.to_owned(),
                PRESENTATION_SUBMISSION_CONTEXT.to_owned(),
            ],
            types: vec![
                VERIFIABLE_PRESENTATION_TYPE.to_owned(),
                PRESENTATION_SUBMISSION_TYPE.to_owned(),
            ],
            presentation_submission: DescriptorMapping { descriptor_map },
            verifiable_credential,
        }
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Return the descriptor map of the presentation submission.
    pub fn descriptor_map(&self) -> &[DescriptorMap] {
        &self.presentation_submission.descriptor_map
    }

    /// Return the submitted credentials, co-indexed with the descriptor map.
    pub fn verifiable_credential(&self) -> &[Json] {
        &self.verifiable_credential
    }

    pub fn is_empty(&self) -> bool {
        self.verifiable_credential.is_empty()
    }

    /// Returns the descriptor map entries grouped by input descriptor id.
    ///
    /// This mapping is helpful for checking if an input descriptor has been
    /// filled, and by which credentials.
    pub fn descriptor_map_by_id(&self) -> HashMap<&str, Vec<&DescriptorMap>> {
        let mut by_id: HashMap<&str, Vec<&DescriptorMap>> = HashMap::new();
        for descriptor_map in self.descriptor_map() {
            by_id
                .entry(descriptor_map.id.as_str())
                .or_default()
                .push(descriptor_map);
        }
        by_id
    }

    /// Return the credentials submitted for the input descriptor `id`.
    pub fn credentials_for(&self, id: &str) -> Vec<&Json> {
        self.descriptor_map()
            .iter()
            .zip(&self.verifiable_credential)
            .filter(|(descriptor_map, _)| descriptor_map.id == id)
            .map(|(_, credential)| credential)
            .collect()
    }
}

impl TryFrom<Json> for PresentationSubmission {
    type Error = anyhow::Error;

    fn try_from(raw: Json) -> Result<Self, Self::Error> {
        let submission: Self = serde_json::from_value(raw)?;

        if submission.descriptor_map().len() != submission.verifiable_credential.len() {
            anyhow::bail!(
                "descriptor map has {} entries for {} credentials",
                submission.descriptor_map().len(),
                submission.verifiable_credential.len()
            )
        }

        for (i, descriptor_map) in submission.descriptor_map().iter().enumerate() {
            if descriptor_map.path != DescriptorMap::path_of(i) {
                anyhow::bail!(
                    "descriptor map entry {i} points at `{}`",
                    descriptor_map.path
                )
            }
        }

        Ok(submission)
    }
}

impl From<PresentationSubmission> for Json {
    fn from(value: PresentationSubmission) -> Self {
        serde_json::to_value(value)
            // SAFETY: by definition, a presentation submission has a valid
            //         JSON representation.
            .unwrap()
    }
}

/// Links one submitted credential back to the input descriptor it fills.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorMap {
    pub id: DescriptorMapId,
    pub path: JsonPath,
}

impl DescriptorMap {
    /// The entry for the credential at `index` in `verifiableCredential`.
    pub fn new(id: impl Into<DescriptorMapId>, index: usize) -> Self {
        Self {
            id: id.into(),
            path: Self::path_of(index),
        }
    }

    fn path_of(index: usize) -> JsonPath {
        format!("$.verifiableCredential[{index}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MANIFEST_TYPE;
    use crate::core::credential::Credential;
    use serde_json::json;

    fn credential(id: &str) -> Credential {
        Credential::from_value(
            json!({ "id": id, "type": ["VerifiableCredential"] }),
            DEFAULT_MANIFEST_TYPE,
        )
    }

    #[test]
    fn paths_are_positional() {
        let (vc1, vc2) = (credential("vc1"), credential("vc2"));
        let results = [
            MatchResult {
                credential: &vc1,
                descriptor_id: "a",
                is_manifest_match: false,
            },
            MatchResult {
                credential: &vc2,
                descriptor_id: "b",
                is_manifest_match: false,
            },
            // The same credential filling a second descriptor is submitted again.
            MatchResult {
                credential: &vc1,
                descriptor_id: "b",
                is_manifest_match: false,
            },
        ];

        let submission = PresentationSubmission::assemble(&results);

        assert_eq!(
            submission.descriptor_map().len(),
            submission.verifiable_credential().len()
        );
        for (i, (descriptor_map, result)) in
            submission.descriptor_map().iter().zip(&results).enumerate()
        {
            assert_eq!(descriptor_map.path, format!("$.verifiableCredential[{i}]"));
            assert_eq!(descriptor_map.id, result.descriptor_id);
            assert_eq!(
                &submission.verifiable_credential()[i],
                result.credential.document()
            );
        }

        assert_eq!(submission.descriptor_map_by_id()["b"].len(), 2);
        assert_eq!(
            submission.credentials_for("b"),
            [vc2.document(), vc1.document()]
        );
    }

    #[test]
    fn serialized_form() {
        let vc = credential("vc1");
        let submission = PresentationSubmission::assemble(&[MatchResult {
            credential: &vc,
            descriptor_id: "citizenship_input_1",
            is_manifest_match: false,
        }]);

        assert_eq!(
            Json::from(submission),
            json!({
                "@context": [
                    "https://www.w3.org/2018/credentials/v1",
                    "https://identity.foundation/presentation-exchange/submission/v1"
                ],
                "type": ["VerifiablePresentation", "PresentationSubmission"],
                "presentationSubmission": {
                    "descriptorMap": [
                        { "id": "citizenship_input_1", "path": "$.verifiableCredential[0]" }
                    ]
                },
                "verifiableCredential": [{ "id": "vc1", "type": ["VerifiableCredential"] }]
            })
        );
    }

    #[test]
    fn empty_submission() {
        let submission = PresentationSubmission::assemble(&[]);
        assert!(submission.is_empty());
        assert!(submission.descriptor_map().is_empty());
    }

    #[test]
    fn parse_checks_positions() {
        let raw = json!({
            "@context": [CREDENTIALS_V1_CONTEXT, PRESENTATION_SUBMISSION_CONTEXT],
            "type": ["VerifiablePresentation", "PresentationSubmission"],
            "presentationSubmission": {
                "descriptorMap": [{ "id": "a", "path": "$.verifiableCredential[0]" }]
            },
            "verifiableCredential": [{ "id": "vc1" }]
        });
        let submission = PresentationSubmission::try_from(raw.clone()).unwrap();
        assert_eq!(submission.credentials_for("a"), [&json!({ "id": "vc1" })]);

        let mut shifted = raw.clone();
        shifted["presentationSubmission"]["descriptorMap"][0]["path"] =
            json!("$.verifiableCredential[1]");
        assert!(PresentationSubmission::try_from(shifted).is_err());

        let mut missing = raw;
        missing["verifiableCredential"] = json!([]);
        assert!(PresentationSubmission::try_from(missing).is_err());
    }
}
