//! Client-facing traits: connect, database handle, container handle, close.
//!
//! The probe only talks to Cosmos DB through these traits, so the concrete
//! REST client can be swapped for an in-memory double.

use std::sync::Arc;

use async_trait::async_trait;

use crate::credential::TokenCredential;
use crate::error::CosmosError;

/// Builds a connected client for an account endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: CosmosService;

    async fn connect(
        &self,
        endpoint: &str,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self::Client, CosmosError>;
}

#[async_trait]
pub trait CosmosService: Send + Sync {
    type Database: DatabaseHandle;

    /// Resolve a handle for the named database.
    async fn database(&self, id: &str) -> Result<Self::Database, CosmosError>;

    /// Release the underlying session. Calling it again is a no-op.
    fn close(&mut self);
}

#[async_trait]
pub trait DatabaseHandle: Send + Sync {
    type Container: ContainerHandle;

    /// Resolve a handle for the named container inside this database.
    async fn container(&self, id: &str) -> Result<Self::Container, CosmosError>;

    /// Read the database resource to confirm it exists remotely.
    async fn validate(&self) -> Result<(), CosmosError>;
}

#[async_trait]
pub trait ContainerHandle: Send + Sync {
    /// Read the container resource to confirm it exists remotely.
    async fn validate(&self) -> Result<(), CosmosError>;
}
