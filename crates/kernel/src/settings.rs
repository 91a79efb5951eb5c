use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use secrecy::SecretString;
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "PROBE_ENV";
const CONFIG_DIR_ENV: &str = "PROBE_CONFIG_DIR";

/// Cosmos DB account endpoint.
pub const COSMOS_ACCOUNT_ENV: &str = "AZURE_COSMOSDB_ACCOUNT";
/// Primary key of the account. Loaded for parity with the deployment
/// environment but never sent; authentication goes through AAD.
pub const COSMOS_ACCOUNT_KEY_ENV: &str = "AZURE_COSMOSDB_ACCOUNT_KEY";
/// Database holding the conversation history.
pub const COSMOS_DATABASE_ENV: &str = "AZURE_COSMOSDB_DATABASE";
/// Container holding conversations.
pub const COSMOS_CONTAINER_ENV: &str = "AZURE_COSMOSDB_CONVERSATIONS_CONTAINER";

/// Deployment environment the probe is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub cosmos: CosmosSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration from `.env`, the config directory and the process
    /// environment.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .with_context(|| "unable to resolve current directory")?,
        };

        Self::load_from(&config_dir, unicode_vars(std::env::vars_os()))
    }

    /// Layer built-in defaults, `base.toml`, `{env}.toml`, `PROBE__*`
    /// variables and finally the `AZURE_COSMOSDB_*` variables taken from
    /// `vars`.
    pub fn load_from(config_dir: &Path, vars: config::Map<String, String>) -> anyhow::Result<Self> {
        let environment_name = vars
            .get(ENV_VAR_NAME)
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let environment = Environment::parse(&environment_name)?;
        tracing::debug!(
            environment = %environment_name,
            config_dir = %config_dir.display(),
            "loading settings"
        );

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment_name));

        let cosmos_overrides = [
            ("cosmos.endpoint", vars.get(COSMOS_ACCOUNT_ENV).cloned()),
            ("cosmos.key", vars.get(COSMOS_ACCOUNT_KEY_ENV).cloned()),
            ("cosmos.database", vars.get(COSMOS_DATABASE_ENV).cloned()),
            ("cosmos.container", vars.get(COSMOS_CONTAINER_ENV).cloned()),
        ];

        let mut builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix("PROBE")
                    .prefix_separator("__")
                    .separator("__")
                    .source(Some(vars.clone())),
            );

        for (key, value) in cosmos_overrides {
            builder = builder
                .set_override_option(key, value)
                .with_context(|| format!("failed to apply override for '{}'", key))?;
        }

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = environment;

        Ok(settings)
    }
}

/// Keep the variables that are valid Unicode; anything else can't name or
/// hold a setting and is skipped.
fn unicode_vars<I>(vars: I) -> config::Map<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Connection values for the Cosmos DB account under test.
#[derive(Debug, Clone, Deserialize)]
pub struct CosmosSettings {
    #[serde(default = "CosmosSettings::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "CosmosSettings::default_key")]
    pub key: SecretString,
    #[serde(default = "CosmosSettings::default_database")]
    pub database: String,
    #[serde(default = "CosmosSettings::default_container")]
    pub container: String,
}

impl CosmosSettings {
    pub const DEFAULT_ENDPOINT: &'static str =
        "https://db-architectcopilot.documents.azure.com:443/";
    pub const DEFAULT_KEY: &'static str = "your_primary_key_here";
    pub const DEFAULT_DATABASE: &'static str = "db_conversation_history";
    pub const DEFAULT_CONTAINER: &'static str = "conversations";

    fn default_endpoint() -> String {
        Self::DEFAULT_ENDPOINT.to_string()
    }

    fn default_key() -> SecretString {
        SecretString::from(Self::DEFAULT_KEY)
    }

    fn default_database() -> String {
        Self::DEFAULT_DATABASE.to_string()
    }

    fn default_container() -> String {
        Self::DEFAULT_CONTAINER.to_string()
    }
}

impl Default for CosmosSettings {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            key: Self::default_key(),
            database: Self::default_database(),
            container: Self::default_container(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
