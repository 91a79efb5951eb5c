//! Error taxonomy for the Cosmos DB client.

use thiserror::Error;

use crate::credential::CredentialError;

/// Errors raised while talking to a Cosmos DB account.
///
/// Only [`CosmosError::Service`] means the service answered and reported a
/// failure. Every other variant means the request never produced a service
/// verdict.
#[derive(Error, Debug)]
pub enum CosmosError {
    #[error("invalid Cosmos DB endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to acquire an AAD token")]
    Credential(#[from] CredentialError),

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{}", describe_service_error(.status, .code, .message))]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected response body from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to format the x-ms-date header")]
    RequestDate(#[from] time::error::Format),

    #[error("Cosmos DB client has been closed")]
    Closed,
}

impl CosmosError {
    /// Whether the service itself answered with an HTTP-level failure.
    pub fn is_service_error(&self) -> bool {
        matches!(self, CosmosError::Service { .. })
    }

    /// HTTP status reported by the service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CosmosError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn describe_service_error(status: &u16, code: &Option<String>, message: &str) -> String {
    match code {
        Some(code) => format!("({}) {} [status {}]", code, message, status),
        None => format!("{} [status {}]", message, status),
    }
}
