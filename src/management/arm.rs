use super::{ManagementClient, RegistryCredentialsResult, RegistryDescriptor, RegistrySku};
use crate::account::Session;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryListResult {
    #[serde(default)]
    value: Vec<ArmRegistry>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmRegistry {
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    sku: ArmSku,
    #[serde(default)]
    properties: ArmRegistryProperties,
}

#[derive(Debug, Deserialize)]
struct ArmSku {
    name: String,
    #[serde(default)]
    tier: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmRegistryProperties {
    #[serde(default)]
    login_server: String,
    #[serde(default)]
    admin_user_enabled: bool,
}

impl From<ArmRegistry> for RegistryDescriptor {
    fn from(registry: ArmRegistry) -> Self {
        Self {
            id: registry.id,
            name: registry.name,
            location: registry.location,
            login_server: registry.properties.login_server,
            sku: RegistrySku {
                name: registry.sku.name,
                tier: registry.sku.tier,
            },
            admin_user_enabled: registry.properties.admin_user_enabled,
        }
    }
}

/// Management-plane client speaking the Microsoft.ContainerRegistry REST API
///
/// Calls are authorised with a directory token acquired from the session for
/// the environment's management resource.
pub struct ArmClient {
    http_client: reqwest::Client,
    api_version: String,
}

impl ArmClient {
    pub fn new(http_client: reqwest::Client, api_version: &str) -> Self {
        Self {
            http_client,
            api_version: api_version.to_string(),
        }
    }

    /// Directory failures stay `ExplorerError::DirectoryToken` so callers can
    /// tell an expired sign-in apart from a management-plane outage
    async fn bearer(&self, session: &Session) -> Result<String> {
        let token = session.directory_token().await?;
        Ok(token.access_token)
    }

    fn endpoint(session: &Session) -> &str {
        session.environment.management_endpoint.trim_end_matches('/')
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        error!("{} failed with status {}: {}", what, status, error_text);
        Err(anyhow!(
            "{} failed with status {}: {}",
            what,
            status,
            error_text
        ))
    }
}

#[async_trait]
impl ManagementClient for ArmClient {
    async fn list_registries(
        &self,
        session: &Session,
        subscription_id: &str,
    ) -> Result<Vec<RegistryDescriptor>> {
        let bearer = self.bearer(session).await?;
        let mut next = Some(format!(
            "{}/subscriptions/{}/providers/Microsoft.ContainerRegistry/registries?api-version={}",
            Self::endpoint(session),
            urlencoding::encode(subscription_id),
            self.api_version
        ));
        let mut registries = Vec::new();

        while let Some(url) = next.take() {
            debug!(subscription = %subscription_id, url = %url, "Listing registries");
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&bearer)
                .send()
                .await
                .context("Failed to send registry list request")?;
            let page: RegistryListResult = Self::check(response, "Registry list request")
                .await?
                .json()
                .await
                .context("Failed to parse registry list response")?;

            registries.extend(page.value.into_iter().map(RegistryDescriptor::from));
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(registries)
    }

    async fn list_credentials(
        &self,
        session: &Session,
        subscription_id: &str,
        resource_group: &str,
        registry_name: &str,
    ) -> Result<RegistryCredentialsResult> {
        let bearer = self.bearer(session).await?;
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerRegistry/registries/{}/listCredentials?api-version={}",
            Self::endpoint(session),
            urlencoding::encode(subscription_id),
            urlencoding::encode(resource_group),
            urlencoding::encode(registry_name),
            self.api_version
        );

        debug!(registry = %registry_name, "Fetching registry admin credentials");
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&bearer)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .context("Failed to send list credentials request")?;

        Self::check(response, "List credentials request")
            .await?
            .json()
            .await
            .context("Failed to parse list credentials response")
    }
}
