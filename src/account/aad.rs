use super::{DirectoryCredential, DirectoryToken};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Directory credential backed by a long-lived refresh token
///
/// Every acquisition redeems the current refresh token at
/// `{directory_endpoint}/{tenant}/oauth2/token`. When the directory rotates
/// the refresh token the new one is kept for the next acquisition.
pub struct RefreshTokenCredential {
    http_client: reqwest::Client,
    directory_endpoint: String,
    tenant_id: String,
    client_id: String,
    refresh_token: Mutex<String>,
}

impl RefreshTokenCredential {
    pub fn new(
        http_client: reqwest::Client,
        directory_endpoint: &str,
        tenant_id: &str,
        client_id: &str,
        refresh_token: &str,
    ) -> Self {
        Self {
            http_client,
            directory_endpoint: directory_endpoint.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            refresh_token: Mutex::new(refresh_token.to_string()),
        }
    }

    fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/token",
            self.directory_endpoint,
            urlencoding::encode(&self.tenant_id)
        )
    }
}

#[async_trait]
impl DirectoryCredential for RefreshTokenCredential {
    async fn acquire_token(&self, resource: &str) -> Result<DirectoryToken> {
        let mut refresh_token = self.refresh_token.lock().await;
        let token_endpoint = self.token_endpoint();

        debug!(
            tenant = %self.tenant_id,
            resource = %resource,
            "Redeeming directory refresh token"
        );

        let response = self
            .http_client
            .post(&token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("resource", resource),
            ])
            .send()
            .await
            .context("Failed to send directory token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            error!(
                "Directory token request failed with status {}: {}",
                status, error_text
            );
            return Err(anyhow!(
                "Directory token request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("Failed to parse directory token response")?;

        if let Some(rotated) = &token_response.refresh_token {
            *refresh_token = rotated.clone();
        }

        Ok(DirectoryToken {
            access_token: token_response.access_token,
            refresh_token: refresh_token.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_acquire_token_redeems_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-a/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "aad-access",
                "refresh_token": "rt-2",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = RefreshTokenCredential::new(
            reqwest::Client::new(),
            &server.uri(),
            "tenant-a",
            "client",
            "rt-1",
        );
        let token = credential
            .acquire_token("https://management.core.windows.net/")
            .await
            .unwrap();

        assert_eq!(token.access_token, "aad-access");
        assert_eq!(token.refresh_token, "rt-2");
    }

    #[tokio::test]
    async fn test_acquire_token_keeps_refresh_token_when_not_rotated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-a/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "aad-access",
            })))
            .mount(&server)
            .await;

        let credential = RefreshTokenCredential::new(
            reqwest::Client::new(),
            &server.uri(),
            "tenant-a",
            "client",
            "rt-1",
        );
        let token = credential.acquire_token("resource").await.unwrap();
        assert_eq!(token.refresh_token, "rt-1");
    }

    #[tokio::test]
    async fn test_acquire_token_surfaces_directory_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let credential = RefreshTokenCredential::new(
            reqwest::Client::new(),
            &server.uri(),
            "tenant-a",
            "client",
            "rt-1",
        );
        let err = credential.acquire_token("resource").await.unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
    }
}
