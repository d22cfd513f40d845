//! The presentation-exchange engine.
//!
//! A [`PresentationExchange`] holds one registered presentation definition at
//! a time. Credentials are matched against it to build an unsigned
//! [`PresentationSubmission`].

use futures::future::join_all;
use serde_json::Value as Json;

use crate::config::Config;
use crate::core::{
    credential::{Credential, ExpandedTypes, ResolvedCredential},
    evaluation::evaluate,
    presentation_definition::DefinitionError,
    presentation_submission::PresentationSubmission,
    registry::DescriptorRegistry,
    requirement_details::{explain, RequirementDetail},
};
use crate::json_ld::{ContextResolver, DocumentFetcher, HttpDocumentFetcher};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no presentation definition has been registered")]
    NotRegistered,

    #[error("credential at index {0} is not a JSON object")]
    InvalidCredential(usize),

    #[error("manifest at index {0} is not a JSON object")]
    InvalidManifest(usize),
}

/// Matches a holder's credentials against a verifier's presentation definition.
#[derive(Debug)]
pub struct PresentationExchange<F = HttpDocumentFetcher> {
    config: Config,
    resolver: ContextResolver<F>,
    registry: Option<DescriptorRegistry>,
}

impl PresentationExchange<HttpDocumentFetcher> {
    /// Create an engine fetching context documents over HTTP, through the
    /// process-wide context cache.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let fetcher = HttpDocumentFetcher::new(&config)?;
        Ok(Self::with_resolver(config, ContextResolver::new(fetcher)))
    }
}

impl<F: DocumentFetcher> PresentationExchange<F> {
    /// Create an engine using `fetcher` and the process-wide context cache.
    pub fn with_fetcher(config: Config, fetcher: F) -> Self {
        Self::with_resolver(config, ContextResolver::new(fetcher))
    }

    pub fn with_resolver(config: Config, resolver: ContextResolver<F>) -> Self {
        Self {
            config,
            resolver,
            registry: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &ContextResolver<F> {
        &self.resolver
    }

    /// Return the registry of the registered definition, if any.
    pub fn registry(&self) -> Option<&DescriptorRegistry> {
        self.registry.as_ref()
    }

    /// Validate a presentation definition and make it the one credentials are
    /// matched against.
    ///
    /// On failure, any previously registered definition is dropped.
    pub fn validate_and_register(&mut self, definition: Json) -> Result<(), DefinitionError> {
        self.registry = None;

        let registry = DescriptorRegistry::from_json(definition)?;
        tracing::debug!(
            "registered presentation definition {:?} with {} input descriptor(s)",
            registry.definition().id(),
            registry.input_descriptors().len()
        );

        self.registry = Some(registry);
        Ok(())
    }

    /// Match `credentials`, then `manifests` as a fallback, against the
    /// registered definition and assemble the resulting submission.
    ///
    /// Context documents are resolved concurrently for every credential.
    /// Credentials matching nothing are left out of the submission, which may
    /// be empty.
    pub async fn create_presentation_submission(
        &self,
        credentials: &[Json],
        manifests: Option<&[Json]>,
    ) -> Result<PresentationSubmission, EngineError> {
        let registry = self.registry.as_ref().ok_or(EngineError::NotRegistered)?;

        let credentials = credentials
            .iter()
            .enumerate()
            .map(|(i, document)| self.ingest(document).ok_or(EngineError::InvalidCredential(i)))
            .collect::<Result<Vec<_>, _>>()?;

        let resolved = join_all(credentials.into_iter().map(|credential| async move {
            let types = match credential.as_concrete() {
                Some(concrete) => self.resolver.expanded_types(concrete).await,
                None => ExpandedTypes::new(),
            };
            ResolvedCredential::new(credential, types)
        }))
        .await;

        let manifests = manifests
            .map(|manifests| {
                manifests
                    .iter()
                    .enumerate()
                    .map(|(i, document)| {
                        self.ingest(document).ok_or(EngineError::InvalidManifest(i))
                    })
                    .filter(|manifest| match manifest {
                        Ok(manifest) if !manifest.is_manifest() => {
                            tracing::warn!(
                                "ignoring credential without `{}` type in the manifest list",
                                self.config.manifest_type
                            );
                            false
                        }
                        _ => true,
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let results = evaluate(&resolved, manifests.as_deref(), registry);
        tracing::debug!("{} credential(s) selected for submission", results.len());

        Ok(PresentationSubmission::assemble(&results))
    }

    /// Describe what the registered definition requests.
    pub fn requirement_details(&self) -> Result<Vec<RequirementDetail>, EngineError> {
        self.registry
            .as_ref()
            .map(|registry| explain(registry, &self.config))
            .ok_or(EngineError::NotRegistered)
    }

    /// Wrap a raw credential document, which must be a JSON object.
    fn ingest(&self, document: &Json) -> Option<Credential> {
        document
            .is_object()
            .then(|| Credential::from_value(document.clone(), &self.config.manifest_type))
    }
}
