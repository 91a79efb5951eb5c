use std::time::Duration;

use async_trait::async_trait;

use super::token::request_token;
use super::{
    scope_to_resource, AccessToken, CredentialError, EnvLookup, TokenCredential, AZURE_CLIENT_ID,
    IDENTITY_ENDPOINT, IDENTITY_HEADER,
};

const NAME: &str = "ManagedIdentityCredential";
const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
/// Outside Azure the IMDS address is unroutable and connects hang; bound the
/// probe so the chain can fall through to the CLI.
const IMDS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Managed identity via App Service's local endpoint or the instance
/// metadata service.
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    env: EnvLookup,
    imds_endpoint: String,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client, env: EnvLookup) -> Self {
        Self {
            http,
            env,
            imds_endpoint: IMDS_ENDPOINT.to_string(),
        }
    }

    /// Point the IMDS flavour at a different endpoint.
    pub fn with_imds_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.imds_endpoint = endpoint.into();
        self
    }

    fn query(&self, api_version: &'static str, resource: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("api-version", api_version.to_string()),
            ("resource", resource.to_string()),
        ];
        if let Some(client_id) = (self.env)(AZURE_CLIENT_ID) {
            query.push(("client_id", client_id));
        }
        query
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let resource =
            scope_to_resource(scopes).map_err(|reason| CredentialError::unavailable(NAME, reason))?;

        if let (Some(endpoint), Some(header)) =
            ((self.env)(IDENTITY_ENDPOINT), (self.env)(IDENTITY_HEADER))
        {
            tracing::debug!(credential = NAME, %endpoint, "using App Service identity endpoint");
            let request = self
                .http
                .get(&endpoint)
                .query(&self.query(APP_SERVICE_API_VERSION, &resource))
                .header("X-IDENTITY-HEADER", header);
            return request_token(NAME, request).await;
        }

        tracing::debug!(credential = NAME, endpoint = %self.imds_endpoint, "probing IMDS");
        let request = self
            .http
            .get(&self.imds_endpoint)
            .query(&self.query(IMDS_API_VERSION, &resource))
            .header("Metadata", "true")
            .timeout(IMDS_PROBE_TIMEOUT);

        match request_token(NAME, request).await {
            Err(CredentialError::Request { source, .. })
                if source.is_connect() || source.is_timeout() =>
            {
                Err(CredentialError::unavailable(
                    NAME,
                    format!("no managed identity endpoint reachable: {}", source),
                ))
            }
            // IMDS answers 400 when no identity is assigned to the host.
            Err(CredentialError::Authentication { reason, .. }) if reason.starts_with("status 400") => {
                Err(CredentialError::unavailable(NAME, reason))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::tests::{env_from, http_client};
    use secrecy::ExposeSecret;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCOPE: &str = "https://acct.documents.azure.com/.default";
    const RESOURCE: &str = "https://acct.documents.azure.com";

    #[tokio::test]
    async fn app_service_endpoint_takes_precedence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/msi/token"))
            .and(query_param("api-version", "2019-08-01"))
            .and(query_param("resource", RESOURCE))
            .and(header("X-IDENTITY-HEADER", "hdr"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"access_token":"as-token","expires_on":"1900000000","resource":"https://acct.documents.azure.com","token_type":"Bearer"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = format!("{}/msi/token", server.uri());
        let credential = ManagedIdentityCredential::new(
            http_client(),
            env_from(&[(IDENTITY_ENDPOINT, endpoint.as_str()), (IDENTITY_HEADER, "hdr")]),
        );

        let token = credential.get_token(&[SCOPE]).await.unwrap();

        assert_eq!(token.token.expose_secret(), "as-token");
        assert_eq!(token.expires_on.unix_timestamp(), 1_900_000_000);
    }

    #[tokio::test]
    async fn imds_request_carries_metadata_header_and_client_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/identity/oauth2/token"))
            .and(query_param("api-version", "2018-02-01"))
            .and(query_param("resource", RESOURCE))
            .and(query_param("client_id", "user-assigned"))
            .and(header("Metadata", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"access_token":"imds-token","expires_in":"3599","expires_on":"1900000000","token_type":"Bearer"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(
            http_client(),
            env_from(&[(AZURE_CLIENT_ID, "user-assigned")]),
        )
        .with_imds_endpoint(format!("{}/metadata/identity/oauth2/token", server.uri()));

        let token = credential.get_token(&[SCOPE]).await.unwrap();

        assert_eq!(token.token.expose_secret(), "imds-token");
    }

    #[tokio::test]
    async fn imds_without_identity_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_raw(
                r#"{"error":"invalid_request","error_description":"Identity not found"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(http_client(), env_from(&[]))
            .with_imds_endpoint(server.uri());

        let err = credential.get_token(&[SCOPE]).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn other_imds_errors_stop_the_chain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_raw("boom", "text/plain"))
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(http_client(), env_from(&[]))
            .with_imds_endpoint(server.uri());

        let err = credential.get_token(&[SCOPE]).await.unwrap_err();
        assert!(matches!(err, CredentialError::Authentication { .. }));
        assert!(err.to_string().contains("status 500: boom"));
    }

    #[tokio::test]
    async fn unreachable_imds_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let credential = ManagedIdentityCredential::new(http_client(), env_from(&[]))
            .with_imds_endpoint(format!("http://{}/token", addr));

        let err = credential.get_token(&[SCOPE]).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
