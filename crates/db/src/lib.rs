//! Cosmos DB client pieces used by the connectivity probe: ambient AAD
//! credentials, a small REST client, and the traits the probe is written
//! against.

pub mod auth;
pub mod client;
pub mod credential;
pub mod error;
pub mod service;

pub use client::{CosmosClient, CosmosConnector, ContainerClient, DatabaseAccount, DatabaseClient};
pub use credential::{
    process_env, AccessToken, CredentialError, DefaultAzureCredential, EnvLookup, TokenCredential,
};
pub use error::CosmosError;
pub use service::{Connector, ContainerHandle, CosmosService, DatabaseHandle};
