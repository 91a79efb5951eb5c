//! The connectivity probe: connect, resolve handles, report, release.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use probe_db::{Connector, ContainerHandle, CosmosError, CosmosService, DatabaseHandle, TokenCredential};
use probe_kernel::{CosmosSettings, ExposeSecret};

pub const SUCCESS_MESSAGE: &str = "✅ Successfully connected to Cosmos DB using AAD authentication!";
pub const FAILURE_PREFIX: &str = "❌ Failed to connect to Cosmos DB";

/// Line printed when the service rejects one of the probe's calls.
pub fn failure_message(err: &CosmosError) -> String {
    format!("{}: {}", FAILURE_PREFIX, err)
}

/// Reported result of one probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Connected,
    /// Carries the service error's display string.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Connecting,
    Connected,
    Failed,
    Released,
}

fn enter(state: ProbeState) {
    tracing::debug!(state = ?state, "probe state");
}

/// Owns a connected client and closes it exactly once when dropped.
pub struct ClientGuard<C: CosmosService> {
    client: C,
}

impl<C: CosmosService> ClientGuard<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: CosmosService> Drop for ClientGuard<C> {
    fn drop(&mut self) {
        self.client.close();
        enter(ProbeState::Released);
    }
}

fn report_failure<W: Write>(err: CosmosError, out: &mut W) -> anyhow::Result<Outcome> {
    enter(ProbeState::Failed);
    tracing::warn!(status = ?err.status(), error = %err, "Cosmos DB rejected the probe");
    writeln!(out, "{}", failure_message(&err)).context("failed to write probe outcome")?;
    Ok(Outcome::Failed(err.to_string()))
}

/// One-shot connectivity check against a Cosmos DB account.
pub struct Probe<C> {
    connector: C,
    validate: bool,
}

impl<C: Connector> Probe<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            validate: false,
        }
    }

    /// Also read the database and container remotely after resolving them.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Run the probe once, writing the outcome line to `out`.
    ///
    /// Service errors, whether raised while connecting or while resolving
    /// handles, are reported and yield [`Outcome::Failed`]. Every other
    /// error is returned and nothing is written.
    pub async fn run<W>(
        &self,
        settings: &CosmosSettings,
        credential: Arc<dyn TokenCredential>,
        out: &mut W,
    ) -> anyhow::Result<Outcome>
    where
        W: Write + Send,
    {
        enter(ProbeState::Connecting);
        tracing::info!(
            endpoint = %settings.endpoint,
            database = %settings.database,
            container = %settings.container,
            validate = self.validate,
            "probing Cosmos DB"
        );
        if !settings.key.expose_secret().is_empty() {
            tracing::debug!("account key is set but ignored; authenticating with AAD");
        }

        // Nothing is acquired until connect succeeds, so neither branch
        // below closes anything.
        let client = match self.connector.connect(&settings.endpoint, credential).await {
            Ok(client) => client,
            Err(err) if err.is_service_error() => return report_failure(err, out),
            Err(err) => {
                return Err(anyhow::Error::new(err).context(format!(
                    "failed to create Cosmos DB client for {}",
                    settings.endpoint
                )))
            }
        };
        let guard = ClientGuard::new(client);
        let resolved = self.resolve(guard.client(), settings).await;

        match resolved {
            Ok(()) => {
                enter(ProbeState::Connected);
                writeln!(out, "{}", SUCCESS_MESSAGE).context("failed to write probe outcome")?;
                Ok(Outcome::Connected)
            }
            Err(err) if err.is_service_error() => report_failure(err, out),
            Err(err) => Err(anyhow::Error::new(err).context("Cosmos DB probe aborted")),
        }
    }

    async fn resolve(&self, client: &C::Client, settings: &CosmosSettings) -> Result<(), CosmosError> {
        let database = client.database(&settings.database).await?;
        let container = database.container(&settings.container).await?;

        if self.validate {
            database.validate().await?;
            container.validate().await?;
        }

        Ok(())
    }
}
