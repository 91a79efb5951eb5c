use async_trait::async_trait;

use super::token::request_token;
use super::{
    AccessToken, CredentialError, EnvLookup, TokenCredential, AZURE_AUTHORITY_HOST,
    AZURE_CLIENT_ID, AZURE_CLIENT_SECRET, AZURE_TENANT_ID, DEFAULT_AUTHORITY_HOST,
};

const NAME: &str = "EnvironmentCredential";

/// Service principal configured through `AZURE_TENANT_ID`,
/// `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
pub struct EnvironmentCredential {
    http: reqwest::Client,
    env: EnvLookup,
}

impl EnvironmentCredential {
    pub fn new(http: reqwest::Client, env: EnvLookup) -> Self {
        Self { http, env }
    }
}

pub(crate) fn token_endpoint(env: &EnvLookup, tenant_id: &str) -> String {
    let authority = env(AZURE_AUTHORITY_HOST).unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority.trim_end_matches('/'),
        tenant_id
    )
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let lookup = |key: &str| {
            (self.env)(key).ok_or_else(|| CredentialError::unavailable(NAME, format!("{} is not set", key)))
        };
        let tenant_id = lookup(AZURE_TENANT_ID)?;
        let client_id = lookup(AZURE_CLIENT_ID)?;
        let client_secret = lookup(AZURE_CLIENT_SECRET)?;

        let scope = scopes.join(" ");
        let endpoint = token_endpoint(&self.env, &tenant_id);
        tracing::debug!(credential = NAME, %endpoint, "requesting client-credentials token");

        let request = self.http.post(&endpoint).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("scope", scope.as_str()),
        ]);

        request_token(NAME, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::tests::{env_from, http_client};
    use secrecy::ExposeSecret;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn unavailable_without_secret() {
        let credential = EnvironmentCredential::new(
            http_client(),
            env_from(&[(AZURE_TENANT_ID, "t"), (AZURE_CLIENT_ID, "c")]),
        );
        let err = credential.get_token(&["https://a/.default"]).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains(AZURE_CLIENT_SECRET));
    }

    #[test]
    fn authority_host_is_configurable() {
        let env = env_from(&[(AZURE_AUTHORITY_HOST, "https://login.example.cn/")]);
        assert_eq!(
            token_endpoint(&env, "tenant"),
            "https://login.example.cn/tenant/oauth2/v2.0/token"
        );
        assert_eq!(
            token_endpoint(&env_from(&[]), "tenant"),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
    }

    #[tokio::test]
    async fn posts_client_credentials_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("client_secret=s3cret"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Facct.documents.azure.com%2F.default",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"token_type":"Bearer","expires_in":3600,"access_token":"sp-token"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let authority = server.uri();
        let credential = EnvironmentCredential::new(
            http_client(),
            env_from(&[
                (AZURE_TENANT_ID, "tenant-1"),
                (AZURE_CLIENT_ID, "client-1"),
                (AZURE_CLIENT_SECRET, "s3cret"),
                (AZURE_AUTHORITY_HOST, authority.as_str()),
            ]),
        );

        let token = credential
            .get_token(&["https://acct.documents.azure.com/.default"])
            .await
            .unwrap();

        assert_eq!(token.token.expose_secret(), "sp-token");
    }

    #[tokio::test]
    async fn rejected_secret_is_an_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/t/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(
                r#"{"error":"invalid_client","error_description":"bad secret"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let authority = server.uri();
        let credential = EnvironmentCredential::new(
            http_client(),
            env_from(&[
                (AZURE_TENANT_ID, "t"),
                (AZURE_CLIENT_ID, "c"),
                (AZURE_CLIENT_SECRET, "s"),
                (AZURE_AUTHORITY_HOST, authority.as_str()),
            ]),
        );

        let err = credential.get_token(&["https://a/.default"]).await.unwrap_err();

        assert!(matches!(err, CredentialError::Authentication { .. }));
        assert!(err.to_string().contains("status 401: bad secret"));
    }
}
