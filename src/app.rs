//! Wiring shared by the binaries: real connector, ambient credential chain,
//! stdout reporting.

use std::io::Write;
use std::sync::Arc;

use probe_db::{CosmosConnector, DefaultAzureCredential};
use probe_kernel::Settings;

use crate::probe::{Outcome, Probe};

/// Per-invocation switches on top of the loaded settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub validate: bool,
}

/// Probe the configured account with the default credential chain.
pub async fn run<W>(settings: &Settings, options: &RunOptions, out: &mut W) -> anyhow::Result<Outcome>
where
    W: Write + Send,
{
    let credential = Arc::new(DefaultAzureCredential::from_process_env());
    tracing::debug!(sources = ?credential.source_names(), "credential chain ready");

    Probe::new(CosmosConnector::default())
        .with_validation(options.validate)
        .run(&settings.cosmos, credential, out)
        .await
}
