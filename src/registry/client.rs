use super::models::{
    BearerTokenPair, CatalogResponse, ExchangeResponse, ManifestV1, Scope, TagListResponse,
    TokenResponse,
};
use crate::account::Session;
use crate::error::{ExplorerError, Result};
use crate::settings::{ManifestReference, RegistrySettings};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const MANIFEST_V1_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v1+prettyjws, application/vnd.docker.distribution.manifest.v1+json";

/// Client for a registry's data plane
///
/// Every call takes the registry login server as `host`. Tokens are never
/// cached: each expansion runs the exchange from the directory token again.
#[derive(Clone)]
pub struct RegistryClient {
    http_client: reqwest::Client,
    scheme: String,
    manifest_reference: ManifestReference,
    manifest_concurrency: usize,
    timeout: Duration,
}

impl RegistryClient {
    pub fn new(http_client: reqwest::Client, settings: &RegistrySettings) -> Self {
        Self {
            http_client,
            scheme: settings.scheme.clone(),
            manifest_reference: settings.manifest_reference,
            manifest_concurrency: settings.manifest_concurrency.max(1),
            timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    pub fn manifest_concurrency(&self) -> usize {
        self.manifest_concurrency
    }

    fn url(&self, host: &str, path: &str) -> String {
        format!("{}://{}{}", self.scheme, host, path)
    }

    /// Run the token exchange for `scope` against `host`
    ///
    /// 1. directory token from the session (failure propagates as fatal)
    /// 2. `POST /oauth2/exchange` for a registry refresh token
    /// 3. `POST /oauth2/token` for a scoped access token
    ///
    /// Returns `Ok(None)` when the directory hands out an incomplete token
    /// pair or when step 2 or 3 answers with an empty body.
    pub async fn acquire_tokens(
        &self,
        session: &Session,
        host: &str,
        scope: &Scope,
    ) -> Result<Option<BearerTokenPair>> {
        let directory = session.directory_token().await?;
        if directory.access_token.is_empty() || directory.refresh_token.is_empty() {
            info!(tenant = %session.tenant_id, "Directory returned an incomplete token pair");
            return Ok(None);
        }

        let refresh_token = match self
            .exchange_refresh_token(
                host,
                &session.tenant_id,
                &directory.access_token,
                &directory.refresh_token,
            )
            .await?
        {
            Some(token) => token,
            None => return Ok(None),
        };

        let access_token = match self.access_token(host, &refresh_token, scope).await? {
            Some(token) => token,
            None => return Ok(None),
        };

        Ok(Some(BearerTokenPair {
            access_token,
            refresh_token,
        }))
    }

    /// Trade directory tokens for a registry refresh token
    pub async fn exchange_refresh_token(
        &self,
        host: &str,
        tenant_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Option<String>> {
        debug!(registry = %host, tenant = %tenant_id, "Exchanging directory token");
        let body = self
            .post_form(
                host,
                "/oauth2/exchange",
                &[
                    ("grant_type", "access_token_refresh_token"),
                    ("service", host),
                    ("tenant", tenant_id),
                    ("refresh_token", refresh_token),
                    ("access_token", access_token),
                ],
            )
            .await?;

        match body {
            Some(body) => {
                let response: ExchangeResponse = serde_json::from_str(&body)
                    .map_err(|e| ExplorerError::invalid_response(host, e))?;
                Ok(response.refresh_token.filter(|t| !t.is_empty()))
            }
            None => {
                debug!(registry = %host, "Token exchange returned an empty body");
                Ok(None)
            }
        }
    }

    /// Redeem a registry refresh token for an access token limited to `scope`
    pub async fn access_token(
        &self,
        host: &str,
        refresh_token: &str,
        scope: &Scope,
    ) -> Result<Option<String>> {
        let scope = scope.to_string();
        debug!(registry = %host, scope = %scope, "Requesting registry access token");
        let body = self
            .post_form(
                host,
                "/oauth2/token",
                &[
                    ("grant_type", "refresh_token"),
                    ("service", host),
                    ("scope", scope.as_str()),
                    ("refresh_token", refresh_token),
                ],
            )
            .await?;

        match body {
            Some(body) => {
                let response: TokenResponse = serde_json::from_str(&body)
                    .map_err(|e| ExplorerError::invalid_response(host, e))?;
                Ok(response.access_token.filter(|t| !t.is_empty()))
            }
            None => {
                debug!(registry = %host, scope = %scope, "Token request returned an empty body");
                Ok(None)
            }
        }
    }

    /// `GET /v2/_catalog`
    pub async fn catalog(&self, host: &str, bearer: &str) -> Result<Vec<String>> {
        let response: CatalogResponse = self.get_json(host, "/v2/_catalog", bearer, None).await?;
        Ok(response.repositories.unwrap_or_default())
    }

    /// `GET /v2/{repository}/tags/list`
    pub async fn tags(&self, host: &str, repository: &str, bearer: &str) -> Result<Vec<String>> {
        let path = format!("/v2/{}/tags/list", repository);
        let response: TagListResponse = self.get_json(host, &path, bearer, None).await?;
        Ok(response.tags.unwrap_or_default())
    }

    /// Manifest reference read for `tag`, following the configured policy
    pub fn manifest_reference_for<'a>(&self, tag: &'a str) -> &'a str {
        match self.manifest_reference {
            ManifestReference::Latest => "latest",
            ManifestReference::Tag => tag,
        }
    }

    /// Creation time of the image described by `tag`
    pub async fn image_created(
        &self,
        host: &str,
        repository: &str,
        tag: &str,
        bearer: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let path = format!(
            "/v2/{}/manifests/{}",
            repository,
            self.manifest_reference_for(tag)
        );
        let manifest: ManifestV1 = self
            .get_json(host, &path, bearer, Some(MANIFEST_V1_ACCEPT))
            .await?;
        manifest
            .created()
            .map_err(|e| ExplorerError::invalid_response(host, e))
    }

    async fn post_form(
        &self,
        host: &str,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<Option<String>> {
        let response = self
            .http_client
            .post(self.url(host, path))
            .timeout(self.timeout)
            .form(form)
            .send()
            .await
            .map_err(|e| ExplorerError::registry(host, format!("POST {}: {}", path, e)))?;

        let body = Self::read_body(host, path, response).await?;
        if body.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(body))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        host: &str,
        path: &str,
        bearer: &str,
        accept: Option<&str>,
    ) -> Result<T> {
        let mut request = self
            .http_client
            .get(self.url(host, path))
            .timeout(self.timeout)
            .bearer_auth(bearer);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExplorerError::registry(host, format!("GET {}: {}", path, e)))?;
        let body = Self::read_body(host, path, response).await?;

        serde_json::from_str(&body)
            .map_err(|e| ExplorerError::invalid_response(host, format!("{}: {}", path, e)))
    }

    async fn read_body(host: &str, path: &str, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExplorerError::registry(host, format!("{}: {}", path, e)))?;

        if !status.is_success() {
            return Err(ExplorerError::registry(
                host,
                format!("{} returned status {}: {}", path, status, body.trim()),
            ));
        }
        Ok(body)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::account::testing::{session, FixedCredential};
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signed_in() -> Session {
        session("tenant-a", Arc::new(FixedCredential::new("aad-access", "aad-refresh")))
    }

    #[tokio::test]
    async fn test_pipeline_returns_access_token_of_final_step() {
        let server = MockServer::start().await;
        let host = host_of(&server);
        Mock::given(method("POST"))
            .and(path("/oauth2/exchange"))
            .and(body_string_contains("tenant=tenant-a"))
            .and(body_string_contains("access_token=aad-access"))
            .and(body_string_contains("refresh_token=aad-refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"refresh_token": "acr-refresh"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("refresh_token=acr-refresh"))
            .and(body_string_contains("scope=registry%3Acatalog%3A*"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "acr-access"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for_mock(ManifestReference::Latest);
        let tokens = client
            .acquire_tokens(&signed_in(), &host, &Scope::Catalog)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tokens.access_token, "acr-access");
        assert_eq!(tokens.refresh_token, "acr-refresh");
    }

    #[tokio::test]
    async fn test_empty_exchange_body_stops_the_pipeline() {
        let server = MockServer::start().await;
        let host = host_of(&server);
        Mock::given(method("POST"))
            .and(path("/oauth2/exchange"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for_mock(ManifestReference::Latest);
        let tokens = client
            .acquire_tokens(&signed_in(), &host, &Scope::Catalog)
            .await
            .unwrap();
        assert!(tokens.is_none());
    }

    #[tokio::test]
    async fn test_empty_token_body_yields_no_tokens() {
        let server = MockServer::start().await;
        let host = host_of(&server);
        Mock::given(method("POST"))
            .and(path("/oauth2/exchange"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"refresh_token": "acr-refresh"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for_mock(ManifestReference::Latest);
        let tokens = client
            .acquire_tokens(
                &signed_in(),
                &host,
                &Scope::RepositoryPull("app1".to_string()),
            )
            .await
            .unwrap();
        assert!(tokens.is_none());
    }

    #[tokio::test]
    async fn test_directory_failure_is_fatal_and_skips_registry() {
        let server = MockServer::start().await;
        let host = host_of(&server);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for_mock(ManifestReference::Latest);
        let failing = session("tenant-a", Arc::new(FixedCredential::failing()));
        let err = client
            .acquire_tokens(&failing, &host, &Scope::Catalog)
            .await
            .unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_exchange_http_error_is_recoverable() {
        let server = MockServer::start().await;
        let host = host_of(&server);
        Mock::given(method("POST"))
            .and(path("/oauth2/exchange"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let client = client_for_mock(ManifestReference::Latest);
        let err = client
            .acquire_tokens(&signed_in(), &host, &Scope::Catalog)
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_catalog_and_tags() {
        let server = MockServer::start().await;
        let host = host_of(&server);
        Mock::given(method("GET"))
            .and(path("/v2/_catalog"))
            .and(bearer("acr-access"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"repositories": ["app1", "team/app2"]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/team/app2/tags/list"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"name": "team/app2", "tags": null})),
            )
            .mount(&server)
            .await;

        let client = client_for_mock(ManifestReference::Latest);
        let repositories = client.catalog(&host, "acr-access").await.unwrap();
        assert_eq!(repositories, vec!["app1", "team/app2"]);

        let tags = client.tags(&host, "team/app2", "acr-access").await.unwrap();
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn test_image_created_honours_manifest_reference() {
        let server = MockServer::start().await;
        let host = host_of(&server);
        let manifest = |created: &str| {
            serde_json::json!({
                "history": [{"v1Compatibility": format!("{{\"created\":\"{}\"}}", created)}]
            })
        };
        Mock::given(method("GET"))
            .and(path("/v2/app1/manifests/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(manifest("2023-01-01T00:00:00Z")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/app1/manifests/v1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(manifest("2020-05-05T00:00:00Z")),
            )
            .mount(&server)
            .await;

        let latest = client_for_mock(ManifestReference::Latest)
            .image_created(&host, "app1", "v1", "t")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.to_rfc3339(), "2023-01-01T00:00:00+00:00");

        let own = client_for_mock(ManifestReference::Tag)
            .image_created(&host, "app1", "v1", "t")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(own.to_rfc3339(), "2020-05-05T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_recoverable() {
        let client = client_for_mock(ManifestReference::Latest);
        // Port 9 (discard) on localhost is not served in test environments
        let err = client.catalog("127.0.0.1:9", "t").await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
