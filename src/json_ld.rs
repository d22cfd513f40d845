//! JSON-LD context handling used to expand credential `type` tokens.
//!
//! Remote context documents are loaded through a [`DocumentFetcher`] and kept
//! in a [`ContextCache`] shared by the whole process. The cache is append-only:
//! once a URI has been fetched successfully it is never fetched again.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value as Json;
use tokio::sync::OnceCell;
use url::Url;

use crate::core::{
    credential::{ConcreteCredential, ExpandedTypes},
    util::{base_request, AsyncHttpClient, ReqwestClient},
};

/// Loads JSON-LD documents by URI.
///
/// Implementations own any timeout or retry policy.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Json>;
}

#[async_trait]
impl<T: DocumentFetcher + ?Sized> DocumentFetcher for Arc<T> {
    async fn fetch(&self, uri: &str) -> Result<Json> {
        (**self).fetch(uri).await
    }
}

/// Fetches context documents over HTTP.
#[derive(Debug)]
pub struct HttpDocumentFetcher<C = ReqwestClient> {
    client: C,
}

impl HttpDocumentFetcher<ReqwestClient> {
    pub fn new(config: &crate::config::Config) -> Result<Self> {
        ReqwestClient::with_timeout(config.context_fetch_timeout()).map(Self::with_client)
    }
}

impl<C: AsyncHttpClient + Send + Sync> HttpDocumentFetcher<C> {
    pub fn with_client(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: AsyncHttpClient + Send + Sync> DocumentFetcher for HttpDocumentFetcher<C> {
    async fn fetch(&self, uri: &str) -> Result<Json> {
        let url = Url::parse(uri).with_context(|| format!("invalid context URI `{uri}`"))?;

        let request = base_request()
            .uri(url.as_str())
            .body(Vec::new())
            .context("failed to construct context request")?;

        let response = self
            .client
            .execute(request)
            .await
            .with_context(|| format!("failed to fetch context `{uri}`"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("context `{uri}` request failed with status {status}")
        }

        serde_json::from_slice(response.body())
            .with_context(|| format!("context `{uri}` is not a JSON document"))
    }
}

/// In-memory map of context documents.
///
/// Useful for wallets that ship the contexts they support, and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDocumentFetcher(HashMap<String, Json>);

impl StaticDocumentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri: impl Into<String>, document: Json) -> Self {
        self.0.insert(uri.into(), document);
        self
    }
}

#[async_trait]
impl DocumentFetcher for StaticDocumentFetcher {
    async fn fetch(&self, uri: &str) -> Result<Json> {
        match self.0.get(uri) {
            Some(document) => Ok(document.clone()),
            None => bail!("unknown context: {uri}"),
        }
    }
}

/// Error raised when a context document cannot be obtained.
#[derive(Debug, Clone, thiserror::Error)]
#[error("context unresolved for `{uri}`: {reason}")]
pub struct ContextError {
    pub uri: String,
    pub reason: String,
}

static SHARED_CACHE: Lazy<Arc<ContextCache>> = Lazy::new(Default::default);

/// Write-once cache of context documents, keyed by URI.
///
/// Each URI owns a cell that is initialized by the first successful fetch.
/// Concurrent callers asking for the same uncached URI wait on the same cell,
/// so a document is only requested once. A failed fetch drops the cell, so
/// only fetched documents are kept.
#[derive(Debug, Default)]
pub struct ContextCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<Json>>>>>,
}

impl ContextCache {
    /// Return the process-wide cache.
    pub fn shared() -> Arc<ContextCache> {
        SHARED_CACHE.clone()
    }

    fn cells(&self) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<Arc<Json>>>>> {
        self.cells
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cell(&self, uri: &str) -> Arc<OnceCell<Arc<Json>>> {
        self.cells().entry(uri.to_owned()).or_default().clone()
    }

    /// Drop the cell of `uri` if it is still `cell` and was never initialized.
    fn evict(&self, uri: &str, cell: &Arc<OnceCell<Arc<Json>>>) {
        let mut cells = self.cells();
        if cells
            .get(uri)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized())
        {
            cells.remove(uri);
        }
    }

    /// Return the cached document for `uri`, if already fetched.
    pub fn get(&self, uri: &str) -> Option<Arc<Json>> {
        self.cells().get(uri).and_then(|cell| cell.get().cloned())
    }

    /// Preload a document. Returns `false` if `uri` was already cached, in
    /// which case the existing document is kept.
    pub fn insert(&self, uri: &str, document: Json) -> bool {
        self.cell(uri).set(Arc::new(document)).is_ok()
    }

    /// Return the cached document for `uri`, fetching it on first use.
    pub async fn get_or_fetch<F: DocumentFetcher + ?Sized>(
        &self,
        uri: &str,
        fetcher: &F,
    ) -> Result<Arc<Json>, ContextError> {
        let cell = self.cell(uri);

        let result = cell
            .get_or_try_init(|| async {
                tracing::debug!("fetching context `{uri}`");
                fetcher.fetch(uri).await.map(Arc::new)
            })
            .await
            .cloned();

        result.map_err(|e| {
            self.evict(uri, &cell);
            ContextError {
                uri: uri.to_owned(),
                reason: format!("{e:#}"),
            }
        })
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.cells()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves the expanded type set of credentials.
#[derive(Debug)]
pub struct ContextResolver<F> {
    fetcher: F,
    cache: Arc<ContextCache>,
}

impl<F: DocumentFetcher> ContextResolver<F> {
    /// Create a resolver backed by the process-wide cache.
    pub fn new(fetcher: F) -> Self {
        Self::with_cache(fetcher, ContextCache::shared())
    }

    pub fn with_cache(fetcher: F, cache: Arc<ContextCache>) -> Self {
        Self { fetcher, cache }
    }

    pub fn cache(&self) -> &Arc<ContextCache> {
        &self.cache
    }

    pub async fn fetch(&self, uri: &str) -> Result<Arc<Json>, ContextError> {
        self.cache.get_or_fetch(uri, &self.fetcher).await
    }

    /// Compute the expanded types of a concrete credential.
    ///
    /// Remote contexts that cannot be fetched are skipped: the credential keeps
    /// whatever types the remaining contexts expand to.
    pub async fn expanded_types(&self, credential: &ConcreteCredential) -> ExpandedTypes {
        let mut types = ExpandedTypes::new();
        let mut documents: Vec<Arc<Json>> = Vec::new();

        for context in credential.contexts() {
            match context {
                Json::String(uri) => {
                    types.insert(uri.as_str());
                    match self.fetch(uri).await {
                        Ok(document) => documents.push(document),
                        Err(e) => tracing::warn!("{e}"),
                    }
                }
                Json::Object(_) => documents.push(Arc::new(context.clone())),
                _ => tracing::debug!("ignoring unsupported @context entry"),
            }
        }

        let documents: Vec<&Json> = documents.iter().map(|document| &**document).collect();

        for token in credential.types() {
            types.insert(token);
            if let Some(iri) = expand(&documents, token) {
                types.insert(iri);
            }
        }

        types
    }
}

/// Expand `token` into a fully-qualified IRI using the given context documents.
///
/// Documents are searched in order; the first definition found wins. Returns
/// `None` when no document defines the term.
pub fn expand(documents: &[&Json], token: &str) -> Option<String> {
    documents
        .iter()
        .find_map(|document| expand_in_document(document, token))
}

/// Prefixes defined in terms of other prefixes are followed at most this deep.
const MAX_PREFIX_DEPTH: usize = 8;

fn expand_in_document(document: &Json, token: &str) -> Option<String> {
    find_term(document, token).map(|value| resolve_prefix(document, value, 0))
}

fn resolve_prefix(document: &Json, value: &str, depth: usize) -> String {
    let Some((prefix, suffix)) = split_compact_iri(value) else {
        return value.to_owned();
    };

    if depth >= MAX_PREFIX_DEPTH {
        tracing::debug!("giving up on prefix chain at `{value}`");
        return value.to_owned();
    }

    match find_term(document, prefix) {
        Some(namespace) if namespace != value => {
            format!("{}{suffix}", resolve_prefix(document, namespace, depth + 1))
        }
        // The prefix may be defined by an enclosing document.
        _ => value.to_owned(),
    }
}

/// Look up the definition of `term`, descending into nested `@context`
/// members and into the scoped contexts of term definitions.
fn find_term<'a>(value: &'a Json, term: &str) -> Option<&'a str> {
    match value {
        Json::Object(object) => {
            if let Some(definition) = object.get(term) {
                if let Some(iri) = term_iri(definition) {
                    return Some(iri);
                }
            }

            if let Some(iri) = object.get("@context").and_then(|c| find_term(c, term)) {
                return Some(iri);
            }

            object
                .iter()
                .filter(|(key, _)| key.as_str() != "@context")
                .filter_map(|(_, definition)| definition.get("@context"))
                .find_map(|scoped| find_term(scoped, term))
        }
        // String entries reference remote contexts and are left to the fetcher.
        Json::Array(items) => items.iter().find_map(|item| find_term(item, term)),
        _ => None,
    }
}

fn term_iri(definition: &Json) -> Option<&str> {
    match definition {
        Json::String(iri) => Some(iri),
        Json::Object(object) => object.get("@id").and_then(Json::as_str),
        _ => None,
    }
}

fn split_compact_iri(value: &str) -> Option<(&str, &str)> {
    let (prefix, suffix) = value.split_once(':')?;

    if prefix.is_empty() || prefix.starts_with('@') || suffix.starts_with("//") {
        return None;
    }

    match prefix {
        "http" | "https" => None,
        _ => Some((prefix, suffix)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::DEFAULT_MANIFEST_TYPE;
    use crate::core::credential::Credential;
    use serde_json::json;

    fn citizenship_context() -> Json {
        json!({
            "@context": {
                "@version": 1.1,
                "@protected": true,
                "citizenship": "https://w3id.org/citizenship#",
                "PermanentResidentCard": {
                    "@id": "https://w3id.org/citizenship#PermanentResidentCard",
                    "@context": {
                        "description": "http://schema.org/description"
                    }
                },
                "PermanentResident": {
                    "@id": "citizenship:PermanentResident",
                    "@context": {
                        "EmployeeCard": "citizenship:EmployeeCard"
                    }
                },
                "Alien": "cit:Alien"
            }
        })
    }

    #[test]
    fn expand_term_definitions() {
        let context = citizenship_context();
        let documents = [&context];

        assert_eq!(
            expand(&documents, "PermanentResidentCard").as_deref(),
            Some("https://w3id.org/citizenship#PermanentResidentCard")
        );
        assert_eq!(
            expand(&documents, "PermanentResident").as_deref(),
            Some("https://w3id.org/citizenship#PermanentResident")
        );
        assert_eq!(expand(&documents, "Unknown"), None);
    }

    #[test]
    fn expand_nested_scoped_context() {
        let context = citizenship_context();

        assert_eq!(
            expand(&[&context], "EmployeeCard").as_deref(),
            Some("https://w3id.org/citizenship#EmployeeCard")
        );
    }

    #[test]
    fn unresolved_prefix_is_kept() {
        let context = citizenship_context();

        assert_eq!(expand(&[&context], "Alien").as_deref(), Some("cit:Alien"));
    }

    #[test]
    fn prefixes_are_resolved_recursively() {
        let context = json!({
            "base": "https://w3id.org/",
            "ctzn": "base:citizenship#",
            "PermanentResidentCard": "ctzn:PermanentResidentCard"
        });

        assert_eq!(
            expand(&[&context], "PermanentResidentCard").as_deref(),
            Some("https://w3id.org/citizenship#PermanentResidentCard")
        );
    }

    #[test]
    fn cyclic_prefixes_terminate() {
        let context = json!({ "a": "b:x", "b": "a:y", "Card": "a:Card" });

        assert!(expand(&[&context], "Card").is_some());
    }

    #[test]
    fn remote_references_are_skipped() {
        let context = json!([
            "https://www.w3.org/2018/credentials/v1",
            { "ex": "https://example.org/vocab#", "Thing": "ex:Thing" }
        ]);

        assert_eq!(
            expand(&[&context], "Thing").as_deref(),
            Some("https://example.org/vocab#Thing")
        );
        assert_eq!(expand(&[&context], "VerifiableCredential"), None);
    }

    #[test]
    fn first_document_wins() {
        let first = json!({ "Card": "https://first.example/Card" });
        let second = json!({ "Card": "https://second.example/Card" });

        assert_eq!(
            expand(&[&first, &second], "Card").as_deref(),
            Some("https://first.example/Card")
        );
    }

    struct CountingFetcher {
        calls: AtomicUsize,
        inner: StaticDocumentFetcher,
    }

    #[async_trait]
    impl DocumentFetcher for CountingFetcher {
        async fn fetch(&self, uri: &str) -> Result<Json> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.inner.fetch(uri).await
        }
    }

    #[tokio::test]
    async fn concurrent_fetches_are_deduplicated() {
        let uri = "https://w3id.org/citizenship/v1";
        let fetcher = CountingFetcher {
            calls: AtomicUsize::new(0),
            inner: StaticDocumentFetcher::new().with_document(uri, citizenship_context()),
        };
        let cache = ContextCache::default();

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch(uri, &fetcher),
            cache.get_or_fetch(uri, &fetcher),
            cache.get_or_fetch(uri, &fetcher),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        cache.get_or_fetch(uri, &fetcher).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let fetcher = CountingFetcher {
            calls: AtomicUsize::new(0),
            inner: StaticDocumentFetcher::new(),
        };
        let cache = ContextCache::default();

        let err = cache
            .get_or_fetch("https://unreachable.example/v1", &fetcher)
            .await
            .unwrap_err();
        assert_eq!(err.uri, "https://unreachable.example/v1");

        assert!(cache
            .get_or_fetch("https://unreachable.example/v1", &fetcher)
            .await
            .is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert!(cache.cells().is_empty());
    }

    #[test]
    fn lookups_do_not_grow_the_cache() {
        let cache = ContextCache::default();

        assert!(cache.get("https://example.org/v1").is_none());
        assert!(cache.get("https://example.org/v2").is_none());
        assert!(cache.cells().is_empty());
    }

    #[test]
    fn insert_is_write_once() {
        let cache = ContextCache::default();

        assert!(cache.insert("https://example.org/v1", json!({ "a": 1 })));
        assert!(!cache.insert("https://example.org/v1", json!({ "a": 2 })));
        assert_eq!(
            cache.get("https://example.org/v1").as_deref(),
            Some(&json!({ "a": 1 }))
        );
    }

    #[tokio::test]
    async fn expanded_types_of_credential() {
        let resolver = ContextResolver::with_cache(
            StaticDocumentFetcher::new()
                .with_document("https://w3id.org/citizenship/v1", citizenship_context()),
            Arc::new(ContextCache::default()),
        );

        let credential = Credential::from_value(
            json!({
                "@context": [
                    "https://www.w3.org/2018/credentials/v1",
                    "https://w3id.org/citizenship/v1",
                    { "Extra": "https://example.org/Extra" }
                ],
                "type": ["VerifiableCredential", "PermanentResidentCard", "Extra"]
            }),
            DEFAULT_MANIFEST_TYPE,
        );

        let types = resolver
            .expanded_types(credential.as_concrete().unwrap())
            .await;

        // The credentials context is unknown to the fetcher, its URI is still exposed.
        assert!(types.contains("https://www.w3.org/2018/credentials/v1"));
        assert!(types.contains("https://w3id.org/citizenship/v1"));
        assert!(types.contains("https://w3id.org/citizenship#PermanentResidentCard"));
        assert!(types.contains("https://example.org/Extra"));
        assert!(types.contains("VerifiableCredential"));
    }
}
