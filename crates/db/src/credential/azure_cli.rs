use async_trait::async_trait;
use serde::Deserialize;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use super::{scope_to_resource, AccessToken, CredentialError, TokenCredential};

const NAME: &str = "AzureCliCredential";

/// Token cached by a local `az login`.
pub struct AzureCliCredential {
    program: String,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self::with_program(program)
    }

    /// Use a different executable in place of `az`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

fn parse_cli_output(stdout: &str) -> Result<AccessToken, CredentialError> {
    let parsed: CliToken = serde_json::from_str(stdout).map_err(|err| {
        CredentialError::authentication(NAME, format!("unexpected az output: {}", err))
    })?;

    let expires_on = match (parsed.expires_on_epoch, parsed.expires_on.as_deref()) {
        (Some(epoch), _) => OffsetDateTime::from_unix_timestamp(epoch)
            .map_err(|err| CredentialError::authentication(NAME, err.to_string()))?,
        // Older CLI builds only report local wall time; treat it as UTC.
        (None, Some(local)) => PrimitiveDateTime::parse(
            local,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        )
        .map_err(|err| CredentialError::authentication(NAME, format!("bad expiresOn: {}", err)))?
        .assume_utc(),
        (None, None) => {
            return Err(CredentialError::authentication(
                NAME,
                "az output carries no expiry",
            ))
        }
    };

    Ok(AccessToken::new(parsed.access_token, expires_on))
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let resource =
            scope_to_resource(scopes).map_err(|reason| CredentialError::unavailable(NAME, reason))?;

        tracing::debug!(credential = NAME, program = %self.program, %resource, "invoking Azure CLI");
        let output = tokio::process::Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--resource"])
            .arg(&resource)
            .output()
            .await
            .map_err(|err| {
                CredentialError::unavailable(NAME, format!("failed to run {}: {}", self.program, err))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("az login") || stderr.contains("not recognized") {
                return Err(CredentialError::unavailable(NAME, "please run 'az login'"));
            }
            return Err(CredentialError::authentication(NAME, stderr));
        }

        parse_cli_output(&String::from_utf8_lossy(&output.stdout))
    }
}
