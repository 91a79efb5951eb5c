pub mod settings;

pub use secrecy::{ExposeSecret, SecretString};
pub use settings::{CosmosSettings, Environment, LogFormat, Settings, TelemetrySettings};
