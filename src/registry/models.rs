use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// Access scope requested from the registry's token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `registry:catalog:*`, needed to list repositories
    Catalog,
    /// `repository:{name}:pull`, needed to list tags and read manifests
    RepositoryPull(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Catalog => write!(f, "registry:catalog:*"),
            Scope::RepositoryPull(name) => write!(f, "repository:{}:pull", name),
        }
    }
}

/// Registry-scoped tokens derived for one expansion
#[derive(Clone, PartialEq, Eq)]
pub struct BearerTokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for BearerTokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeResponse {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogResponse {
    pub repositories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagListResponse {
    pub tags: Option<Vec<String>>,
}

/// Schema 1 image manifest, reduced to the history the explorer reads
#[derive(Debug, Deserialize)]
pub(crate) struct ManifestV1 {
    #[serde(default)]
    pub history: Vec<ManifestHistory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ManifestHistory {
    /// JSON document embedded as a string
    pub v1_compatibility: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V1Compatibility {
    pub created: Option<DateTime<Utc>>,
}

impl ManifestV1 {
    /// Creation time recorded in the first history entry
    pub fn created(&self) -> Result<Option<DateTime<Utc>>, serde_json::Error> {
        match self.history.first() {
            Some(entry) => {
                let compat: V1Compatibility = serde_json::from_str(&entry.v1_compatibility)?;
                Ok(compat.created)
            }
            None => Ok(None),
        }
    }
}
