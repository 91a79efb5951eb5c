use async_trait::async_trait;

use super::environment::token_endpoint;
use super::token::request_token;
use super::{
    AccessToken, CredentialError, EnvLookup, TokenCredential, AZURE_CLIENT_ID,
    AZURE_FEDERATED_TOKEN_FILE, AZURE_TENANT_ID,
};

const NAME: &str = "WorkloadIdentityCredential";
const JWT_BEARER_ASSERTION: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Federated workload identity (AKS and similar), exchanging the projected
/// service account token for an AAD token.
pub struct WorkloadIdentityCredential {
    http: reqwest::Client,
    env: EnvLookup,
}

impl WorkloadIdentityCredential {
    pub fn new(http: reqwest::Client, env: EnvLookup) -> Self {
        Self { http, env }
    }
}

#[async_trait]
impl TokenCredential for WorkloadIdentityCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let lookup = |key: &str| {
            (self.env)(key).ok_or_else(|| CredentialError::unavailable(NAME, format!("{} is not set", key)))
        };
        let tenant_id = lookup(AZURE_TENANT_ID)?;
        let client_id = lookup(AZURE_CLIENT_ID)?;
        let token_file = lookup(AZURE_FEDERATED_TOKEN_FILE)?;

        let assertion = tokio::fs::read_to_string(&token_file).await.map_err(|err| {
            CredentialError::authentication(
                NAME,
                format!("failed to read federated token file {}: {}", token_file, err),
            )
        })?;

        let scope = scopes.join(" ");
        let endpoint = token_endpoint(&self.env, &tenant_id);
        tracing::debug!(credential = NAME, %endpoint, "exchanging federated token");

        let request = self.http.post(&endpoint).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_assertion_type", JWT_BEARER_ASSERTION),
            ("client_assertion", assertion.trim()),
            ("scope", scope.as_str()),
        ]);

        request_token(NAME, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::tests::{env_from, http_client};
    use crate::credential::AZURE_AUTHORITY_HOST;
    use secrecy::ExposeSecret;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn unavailable_without_token_file() {
        let credential = WorkloadIdentityCredential::new(
            http_client(),
            env_from(&[(AZURE_TENANT_ID, "t"), (AZURE_CLIENT_ID, "c")]),
        );
        let err = credential.get_token(&["https://a/.default"]).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn missing_token_file_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("token");
        let credential = WorkloadIdentityCredential::new(
            http_client(),
            env_from(&[
                (AZURE_TENANT_ID, "t"),
                (AZURE_CLIENT_ID, "c"),
                (AZURE_FEDERATED_TOKEN_FILE, missing.to_str().unwrap()),
            ]),
        );
        let err = credential.get_token(&["https://a/.default"]).await.unwrap_err();
        assert!(matches!(err, CredentialError::Authentication { .. }));
    }

    #[tokio::test]
    async fn sends_federated_assertion() {
        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("token");
        std::fs::write(&token_file, "eyJhbGciOi.projected\n").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/t/oauth2/v2.0/token"))
            .and(body_string_contains("client_assertion=eyJhbGciOi.projected&"))
            .and(body_string_contains(
                "client_assertion_type=urn%3Aietf%3Aparams%3Aoauth%3Aclient-assertion-type%3Ajwt-bearer",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"token_type":"Bearer","expires_in":3600,"access_token":"wi-token"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let authority = server.uri();
        let credential = WorkloadIdentityCredential::new(
            http_client(),
            env_from(&[
                (AZURE_TENANT_ID, "t"),
                (AZURE_CLIENT_ID, "c"),
                (AZURE_FEDERATED_TOKEN_FILE, token_file.to_str().unwrap()),
                (AZURE_AUTHORITY_HOST, authority.as_str()),
            ]),
        );

        let token = credential.get_token(&["https://a/.default"]).await.unwrap();

        assert_eq!(token.token.expose_secret(), "wi-token");
    }
}
