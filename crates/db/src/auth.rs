//! Request header helpers for AAD-authenticated Cosmos DB calls.

use secrecy::{ExposeSecret, SecretString};
use time::macros::format_description;
use time::OffsetDateTime;
use url::Url;

use crate::error::CosmosError;

/// REST API version sent with every request.
pub const API_VERSION: &str = "2018-12-31";

/// `authorization` header value for an AAD bearer token.
pub fn aad_authorization(token: &SecretString) -> String {
    let raw = format!("type=aad&ver=1.0&sig={}", token.expose_secret());
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// `x-ms-date` header value: RFC 1123, lowercased.
pub fn ms_date(now: OffsetDateTime) -> Result<String, CosmosError> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    let date = now.to_offset(time::UtcOffset::UTC).format(format)?;
    Ok(date.to_lowercase())
}

/// AAD scope covering the data plane of the account behind `endpoint`.
pub fn account_scope(endpoint: &Url) -> Result<String, CosmosError> {
    let host = endpoint.host_str().ok_or_else(|| CosmosError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: "endpoint has no host".to_string(),
    })?;
    Ok(format!("{}://{}/.default", endpoint.scheme(), host))
}
