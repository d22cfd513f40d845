use std::collections::BTreeSet;

use super::credential::{Credential, ExpandedTypes, ManifestCredential};
use super::filter::Filter;
use crate::utils::{to_human_readable_string, NonEmptyVec};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A GroupId represents a unique identifier for a group of Input Descriptors.
///
/// This type is also used by the submission requirements to group input descriptors.
pub type GroupId = String;

/// A JSONPath is a string that represents a path to a specific value within a JSON object.
///
/// For syntax details, see [https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition)
pub type JsonPath = String;

/// Error raised when a field path cannot be evaluated against a credential.
///
/// The field is then treated as having found no value.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid JSONPath `{path}`: {reason}")]
pub struct PathEvaluationError {
    pub path: JsonPath,
    pub reason: String,
}

/// Input Descriptors are objects used to describe the information a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:verifier) requires of a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder).
///
/// A credential fills an input descriptor when its expanded types satisfy the
/// `schema` entries and its content satisfies every constraints field.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v1.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    id: String,
    schema: NonEmptyVec<Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    group: Vec<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<Constraints>,
}

impl InputDescriptor {
    /// Create a new instance of the input descriptor with the given id and schema.
    ///
    /// The id MUST NOT conflict with the id of another Input Descriptor Object
    /// in the same Presentation Definition.
    pub fn new(id: String, schema: Schema) -> Self {
        Self {
            id,
            schema: NonEmptyVec::new(schema),
            group: Vec::new(),
            name: None,
            purpose: None,
            constraints: None,
        }
    }

    /// Return the id of the input descriptor.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Add a schema alternative to the input descriptor.
    pub fn add_schema(mut self, schema: Schema) -> Self {
        self.schema.push(schema);
        self
    }

    /// Return the schema entries of the input descriptor.
    pub fn schema(&self) -> &[Schema] {
        &self.schema
    }

    /// Set the constraints of the input descriptor.
    pub fn set_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Return the constraints of the input descriptor.
    pub fn constraints(&self) -> Option<&Constraints> {
        self.constraints.as_ref()
    }

    /// Set the name of the input descriptor.
    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Return the name of the input descriptor.
    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the purpose of the input descriptor.
    ///
    /// If present, the purpose MUST be a string that describes the purpose for which the
    /// [Claim](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:claim)'s
    /// data is being requested.
    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    /// Return the purpose of the input descriptor.
    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Set the group of the input descriptor.
    pub fn set_group(mut self, group: Vec<GroupId>) -> Self {
        self.group = group;
        self
    }

    /// Add the input descriptor to a group.
    pub fn add_to_group(mut self, member: GroupId) -> Self {
        self.group.push(member);
        self
    }

    /// Return the groups of the input descriptor.
    pub fn groups(&self) -> &[GroupId] {
        &self.group
    }

    /// Return whether the input descriptor belongs to `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.group.iter().any(|g| g == group)
    }

    /// Decide whether a credential fills this input descriptor.
    ///
    /// Manifest credentials never match here, see [InputDescriptor::matches_manifest].
    pub fn matches(&self, credential: &Credential, types: &ExpandedTypes) -> bool {
        let Some(concrete) = credential.as_concrete() else {
            return false;
        };

        if !self.matches_schema(types) {
            tracing::debug!(
                "credential does not satisfy the schema of input descriptor `{}`",
                self.id
            );
            return false;
        }

        match &self.constraints {
            Some(constraints) => constraints.matches(concrete.document()),
            None => true,
        }
    }

    /// Check the credential's expanded types against the schema entries.
    ///
    /// Schema entries flagged `required` must all be present. Without any such
    /// entry, one present schema URI is enough.
    pub fn matches_schema(&self, types: &ExpandedTypes) -> bool {
        let (required, optional): (Vec<&Schema>, Vec<&Schema>) =
            self.schema.iter().partition(|schema| schema.is_required());

        if !required.is_empty() {
            return required.iter().all(|schema| types.contains(schema.uri()));
        }

        optional.iter().any(|schema| types.contains(schema.uri()))
    }

    /// Decide whether a manifest credential could fill this input descriptor.
    ///
    /// Manifests carry no resolvable content, so only their declared contexts
    /// are compared against the schema URIs and the `filter.const` hints.
    pub fn matches_manifest(&self, manifest: &ManifestCredential) -> bool {
        let accepted = self.manifest_hints();

        manifest
            .contexts()
            .iter()
            .any(|context| accepted.contains(context.as_str()))
    }

    /// Return the values a manifest context may take to match this descriptor.
    ///
    /// These are the schema URIs without their fragment, plus every string
    /// `const` found in the constraints field filters.
    pub fn manifest_hints(&self) -> BTreeSet<&str> {
        let schemas = self.schema.iter().map(|schema| schema.uri_without_fragment());

        let consts = self
            .constraints
            .iter()
            .flat_map(|constraints| constraints.fields())
            .filter_map(|field| field.filter())
            .filter_map(|filter| filter.get("const"))
            .filter_map(Json::as_str);

        schemas.chain(consts).collect()
    }
}

/// A schema entry of an input descriptor.
///
/// The `uri` identifies an acceptable credential type or context.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
}

impl Schema {
    pub fn new(uri: String) -> Self {
        Self {
            uri,
            required: None,
        }
    }

    /// Mark this schema entry as required.
    pub fn set_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    /// Return the URI without its `#fragment`, if any.
    pub fn uri_without_fragment(&self) -> &str {
        match self.uri.split_once('#') {
            Some((base, _)) => base,
            None => &self.uri,
        }
    }
}

/// Constraints are objects used to describe the constraints that a [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder) must satisfy to fulfill an Input Descriptor.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v1.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<NonEmptyVec<ConstraintsField>>,
}

impl Constraints {
    /// Returns an empty Constraints object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new field constraint to the constraints list.
    pub fn add_constraint(mut self, field: ConstraintsField) -> Self {
        match &mut self.fields {
            Some(fields) => fields.push(field),
            None => self.fields = Some(NonEmptyVec::new(field)),
        }
        self
    }

    /// Returns the fields of the constraints object.
    pub fn fields(&self) -> &[ConstraintsField] {
        self.fields.as_deref().unwrap_or_default()
    }

    /// Check whether `document` satisfies every constraints field.
    pub fn matches(&self, document: &Json) -> bool {
        self.fields().iter().all(|field| field.matches(document))
    }
}

/// ConstraintsField objects are used to describe the constraints that a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder)
/// must satisfy to fulfill an Input Descriptor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintsField {
    path: NonEmptyVec<JsonPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Json>,
}

impl From<NonEmptyVec<JsonPath>> for ConstraintsField {
    fn from(path: NonEmptyVec<JsonPath>) -> Self {
        Self {
            path,
            id: None,
            purpose: None,
            name: None,
            filter: None,
        }
    }
}

impl ConstraintsField {
    /// Create a new instance of the constraints field with the given path.
    pub fn new(path: JsonPath) -> ConstraintsField {
        NonEmptyVec::new(path).into()
    }

    /// Add a fallback path to the constraints field.
    pub fn add_path(mut self, path: JsonPath) -> Self {
        self.path.push(path);
        self
    }

    /// Return the paths of the constraints field.
    ///
    /// Paths are tried in order; the first one selecting a value is used.
    pub fn path(&self) -> &NonEmptyVec<JsonPath> {
        &self.path
    }

    pub fn set_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the filter of the constraints field.
    ///
    /// If present its value MUST be a JSON Schema descriptor used to filter against
    /// the values returned from evaluation of the JSONPath string expressions in the path array.
    pub fn set_filter(mut self, filter: Json) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Return the raw filter of the constraints field.
    pub fn filter(&self) -> Option<&Json> {
        self.filter.as_ref()
    }

    /// Return the values selected by the first path yielding any.
    ///
    /// Paths that fail to parse are skipped.
    pub fn select<'a>(&self, document: &'a Json) -> Vec<&'a Json> {
        for path in self.path.iter() {
            match query(path, document) {
                Ok(values) if !values.is_empty() => return values,
                // > If the result returned no JSONPath match, skip to the next path array element.
                Ok(_) => continue,
                Err(e) => tracing::debug!("{e}"),
            }
        }

        Vec::new()
    }

    /// Check whether `document` satisfies this field.
    pub fn matches(&self, document: &Json) -> bool {
        let values = self.select(document);

        if values.is_empty() {
            tracing::debug!("no value found for field paths {:?}", &*self.path);
            return false;
        }

        let Some(filter) = &self.filter else {
            return true;
        };

        match Filter::compile(filter) {
            Ok(filter) => !filter.retain(values).is_empty(),
            Err(e) => {
                tracing::warn!("field paths {:?}: {e}", &*self.path);
                false
            }
        }
    }

    /// Return the requested field in the format specified in the constraints field,
    /// without changing its type casing, e.g. camelCase, snake_case, etc.
    ///
    /// e.g., `["$.credentialSubject.dateOfBirth"]` will return `["dateOfBirth"]`.
    pub fn requested_fields(&self) -> Vec<String> {
        self.path()
            .iter()
            .filter_map(|path| {
                path.split(&['.', '[', ']', '\'', '"', '$', '@'][..])
                    .filter(|segment| !segment.is_empty() && *segment != "*")
                    .last()
            })
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Return the humanly-readable requested fields of the constraints field.
    ///
    /// e.g., `["$.credentialSubject.dateOfBirth"]` will return `["Date Of Birth"]`.
    pub fn requested_fields_human_readable(&self) -> Vec<String> {
        self.requested_fields()
            .into_iter()
            .map(to_human_readable_string)
            .collect()
    }
}

/// Evaluate a single JSONPath query against `document`.
pub fn query<'a>(path: &str, document: &'a Json) -> Result<Vec<&'a Json>, PathEvaluationError> {
    let json_path = serde_json_path::JsonPath::parse(path).map_err(|e| PathEvaluationError {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;

    Ok(json_path.query(document).all())
}
