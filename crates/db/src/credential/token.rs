use serde::Deserialize;
use time::OffsetDateTime;

use super::{AccessToken, CredentialError};

/// Token payload shared by the AAD v2 endpoint and the managed identity
/// endpoints. Managed identity reports its numbers as strings.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<NumberOrString>,
    #[serde(default)]
    expires_on: Option<NumberOrString>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    String(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::String(s) => s.trim().parse().ok(),
        }
    }
}

impl TokenResponse {
    pub(crate) fn into_access_token(
        self,
        credential: &'static str,
        now: OffsetDateTime,
    ) -> Result<AccessToken, CredentialError> {
        let expires_on = if let Some(epoch) = self.expires_on.as_ref().and_then(NumberOrString::as_i64) {
            OffsetDateTime::from_unix_timestamp(epoch).map_err(|err| {
                CredentialError::authentication(credential, format!("invalid expires_on: {}", err))
            })?
        } else if let Some(secs) = self.expires_in.as_ref().and_then(NumberOrString::as_i64) {
            now.checked_add(time::Duration::seconds(secs)).ok_or_else(|| {
                CredentialError::authentication(
                    credential,
                    format!("expires_in of {} seconds is out of range", secs),
                )
            })?
        } else {
            return Err(CredentialError::authentication(
                credential,
                "token response carries no expiry",
            ));
        };

        Ok(AccessToken::new(self.access_token, expires_on))
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Send a token request and turn the response into an [`AccessToken`].
pub(crate) async fn request_token(
    credential: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<AccessToken, CredentialError> {
    let response = request
        .send()
        .await
        .map_err(|source| CredentialError::Request { credential, source })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| CredentialError::Request { credential, source })?;

    if !status.is_success() {
        return Err(CredentialError::authentication(
            credential,
            describe_token_error(status.as_u16(), &body),
        ));
    }

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|err| {
        CredentialError::authentication(credential, format!("malformed token response: {}", err))
    })?;

    parsed.into_access_token(credential, OffsetDateTime::now_utc())
}

pub(crate) fn describe_token_error(status: u16, body: &str) -> String {
    let parsed: TokenErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed
        .error_description
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| body.trim().to_string());
    format!("status {}: {}", status, detail)
}
