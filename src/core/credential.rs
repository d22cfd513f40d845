use std::collections::BTreeSet;

use serde_json::Value as Json;

use crate::utils::json_strings;

/// A credential handed to the engine by the holder's credential store.
///
/// The variant is decided once, when the document is ingested, from the
/// credential's `type` member.
#[derive(Clone, Debug, PartialEq)]
pub enum Credential {
    /// A Verifiable Credential the holder actually has.
    Concrete(ConcreteCredential),
    /// A placeholder for a credential the holder can obtain later.
    Manifest(ManifestCredential),
}

impl Credential {
    /// Classify a credential document, using `manifest_type` as the reserved
    /// `type` entry marking manifest credentials.
    pub fn from_value(document: Json, manifest_type: &str) -> Self {
        let is_manifest = json_strings(document.get("type"))
            .iter()
            .any(|t| *t == manifest_type);

        if is_manifest {
            Self::Manifest(ManifestCredential::new(document))
        } else {
            Self::Concrete(ConcreteCredential(document))
        }
    }

    /// Return the credential document as it will appear in a submission.
    pub fn document(&self) -> &Json {
        match self {
            Self::Concrete(c) => c.document(),
            Self::Manifest(m) => m.document(),
        }
    }

    pub fn is_manifest(&self) -> bool {
        matches!(self, Self::Manifest(_))
    }

    pub fn as_concrete(&self) -> Option<&ConcreteCredential> {
        match self {
            Self::Concrete(c) => Some(c),
            Self::Manifest(_) => None,
        }
    }

    pub fn as_manifest(&self) -> Option<&ManifestCredential> {
        match self {
            Self::Manifest(m) => Some(m),
            Self::Concrete(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConcreteCredential(Json);

impl ConcreteCredential {
    pub fn document(&self) -> &Json {
        &self.0
    }

    /// Return the `@context` entries of the credential, in order.
    ///
    /// Entries are either remote context URIs or inline context objects.
    pub fn contexts(&self) -> Vec<&Json> {
        match self.0.get("@context") {
            Some(Json::Array(items)) => items.iter().collect(),
            Some(value) => vec![value],
            None => Vec::new(),
        }
    }

    /// Return the `type` tokens of the credential, in order.
    pub fn types(&self) -> Vec<&str> {
        json_strings(self.0.get("type"))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ManifestCredential {
    document: Json,
    contexts: Vec<String>,
}

impl ManifestCredential {
    fn new(document: Json) -> Self {
        let contexts = json_strings(
            document
                .get("credentialSubject")
                .and_then(|subject| subject.get("contexts")),
        )
        .into_iter()
        .map(ToOwned::to_owned)
        .collect();

        Self { document, contexts }
    }

    pub fn document(&self) -> &Json {
        &self.document
    }

    /// Return the contexts declared in `credentialSubject.contexts`.
    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }
}

/// The set of fully-qualified type identifiers exposed by a concrete credential.
///
/// It holds the credential's remote `@context` URIs, its raw `type` tokens and
/// the expansion of those tokens against the credential's context documents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpandedTypes(BTreeSet<String>);

impl ExpandedTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, iri: impl Into<String>) -> bool {
        self.0.insert(iri.into())
    }

    pub fn contains(&self, iri: &str) -> bool {
        self.0.contains(iri)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExpandedTypes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A credential paired with its expanded types, ready for matching.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedCredential {
    pub credential: Credential,
    pub types: ExpandedTypes,
}

impl ResolvedCredential {
    pub fn new(credential: Credential, types: ExpandedTypes) -> Self {
        Self { credential, types }
    }
}
