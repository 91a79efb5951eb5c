//! Ambient AAD credential discovery.
//!
//! [`DefaultAzureCredential`] walks a fixed chain of sources and returns the
//! first token one of them produces. Each source reads its configuration
//! through an injected [`EnvLookup`] so the chain can be exercised without
//! touching the real process environment.

mod azure_cli;
mod environment;
mod managed_identity;
mod token;
mod workload;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use time::OffsetDateTime;

pub use azure_cli::AzureCliCredential;
pub use environment::EnvironmentCredential;
pub use managed_identity::ManagedIdentityCredential;
pub use workload::WorkloadIdentityCredential;

pub const AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const AZURE_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const AZURE_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
pub const AZURE_FEDERATED_TOKEN_FILE: &str = "AZURE_FEDERATED_TOKEN_FILE";
pub const IDENTITY_ENDPOINT: &str = "IDENTITY_ENDPOINT";
pub const IDENTITY_HEADER: &str = "IDENTITY_HEADER";

pub(crate) const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Lookup function for environment-style configuration.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Lookup backed by the real process environment. Empty values count as
/// unset.
pub fn process_env() -> EnvLookup {
    Arc::new(|key: &str| std::env::var(key).ok().filter(|value| !value.is_empty()))
}

/// Bearer token issued by AAD.
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_on: OffsetDateTime,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: OffsetDateTime) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_on,
        }
    }

    /// Whether the token is still valid for at least `margin`.
    pub fn is_fresh(&self, now: OffsetDateTime, margin: time::Duration) -> bool {
        self.expires_on - now > margin
    }
}

#[derive(Error, Debug)]
pub enum CredentialError {
    /// The source is not configured in this environment; the chain moves on.
    #[error("{credential} unavailable: {reason}")]
    Unavailable {
        credential: &'static str,
        reason: String,
    },

    /// The source is configured but the identity provider rejected it.
    #[error("{credential} authentication failed: {reason}")]
    Authentication {
        credential: &'static str,
        reason: String,
    },

    #[error("{credential} token request failed")]
    Request {
        credential: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("no credential in the chain produced a token: {}", .attempts.join("; "))]
    Exhausted { attempts: Vec<String> },
}

impl CredentialError {
    pub(crate) fn unavailable(credential: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            credential,
            reason: reason.into(),
        }
    }

    pub(crate) fn authentication(credential: &'static str, reason: impl Into<String>) -> Self {
        Self::Authentication {
            credential,
            reason: reason.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CredentialError::Unavailable { .. })
    }
}

/// Source of AAD bearer tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Name used in logs and chain diagnostics.
    fn name(&self) -> &'static str;

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError>;
}

/// Chain of ambient credential sources tried in order.
pub struct DefaultAzureCredential {
    sources: Vec<Box<dyn TokenCredential>>,
}

impl DefaultAzureCredential {
    /// Standard chain: environment secret, workload identity, managed
    /// identity, Azure CLI.
    pub fn new(http: reqwest::Client, env: EnvLookup) -> Self {
        Self::from_sources(vec![
            Box::new(EnvironmentCredential::new(http.clone(), env.clone())),
            Box::new(WorkloadIdentityCredential::new(http.clone(), env.clone())),
            Box::new(ManagedIdentityCredential::new(http, env)),
            Box::new(AzureCliCredential::new()),
        ])
    }

    /// Standard chain reading the real process environment.
    pub fn from_process_env() -> Self {
        Self::new(reqwest::Client::new(), process_env())
    }

    pub fn from_sources(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }
}

#[async_trait]
impl TokenCredential for DefaultAzureCredential {
    fn name(&self) -> &'static str {
        "DefaultAzureCredential"
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let mut attempts = Vec::new();

        for source in &self.sources {
            match source.get_token(scopes).await {
                Ok(token) => {
                    tracing::info!(credential = source.name(), "acquired AAD token");
                    return Ok(token);
                }
                Err(err) if err.is_unavailable() => {
                    tracing::debug!(credential = source.name(), error = %err, "credential skipped");
                    attempts.push(err.to_string());
                }
                Err(err) => {
                    tracing::warn!(credential = source.name(), error = %err, "credential failed");
                    return Err(err);
                }
            }
        }

        Err(CredentialError::Exhausted { attempts })
    }
}

/// Convert a `.default` scope into the v1 resource identifier expected by
/// managed identity endpoints and the Azure CLI.
pub(crate) fn scope_to_resource(scopes: &[&str]) -> Result<String, String> {
    match scopes {
        [scope] => Ok(scope.strip_suffix("/.default").unwrap_or(*scope).to_string()),
        _ => Err(format!("expected exactly one scope, got {}", scopes.len())),
    }
}
