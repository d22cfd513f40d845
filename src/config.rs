use std::time::Duration;

use serde::Deserialize;

/// Marker placed in the `type` of a credential that stands in for one the
/// holder can obtain later.
pub const DEFAULT_MANIFEST_TYPE: &str = "ManifestCredential";

/// Purpose shown for a requirement or descriptor that does not state one.
pub const DEFAULT_PURPOSE: &str = "The verifier did not provide a purpose for this request.";

/// Engine configuration.
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// `type` entry identifying manifest credentials.
    pub manifest_type: String,
    /// Purpose text used by the requirement explainer when none is given.
    pub default_purpose: String,
    /// Timeout applied by the HTTP document fetcher, in seconds.
    pub context_fetch_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_type: DEFAULT_MANIFEST_TYPE.to_owned(),
            default_purpose: DEFAULT_PURPOSE.to_owned(),
            context_fetch_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn context_fetch_timeout(&self) -> Option<Duration> {
        self.context_fetch_timeout_secs.map(Duration::from_secs)
    }
}
