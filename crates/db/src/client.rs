//! Minimal Cosmos DB REST client authenticated with AAD tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use crate::auth::{aad_authorization, account_scope, ms_date, API_VERSION};
use crate::credential::{AccessToken, TokenCredential};
use crate::error::CosmosError;
use crate::service::{Connector, ContainerHandle, CosmosService, DatabaseHandle};

/// Tokens closer than this to expiry are refreshed before use.
const TOKEN_REFRESH_MARGIN: time::Duration = time::Duration::minutes(5);

/// Account metadata returned by `GET /`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub writable_locations: Vec<AccountLocation>,
    #[serde(default)]
    pub readable_locations: Vec<AccountLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountLocation {
    pub name: String,
    #[serde(rename = "databaseAccountEndpoint")]
    pub endpoint: String,
}

/// System properties shared by database and container resources.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceProperties {
    pub id: String,
    #[serde(rename = "_rid", default)]
    pub rid: String,
    #[serde(rename = "_etag", default)]
    pub etag: String,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

struct ClientInner {
    http: reqwest::Client,
    endpoint: Url,
    scope: String,
    credential: Arc<dyn TokenCredential>,
    token: Mutex<Option<AccessToken>>,
    closed: AtomicBool,
}

impl ClientInner {
    async fn bearer(&self) -> Result<SecretString, CosmosError> {
        let mut cached = self.token.lock().await;
        let now = OffsetDateTime::now_utc();

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now, TOKEN_REFRESH_MARGIN) {
                return Ok(token.token.clone());
            }
        }

        let token = self.credential.get_token(&[self.scope.as_str()]).await?;
        let bearer = token.token.clone();
        *cached = Some(token);
        Ok(bearer)
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url, CosmosError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CosmosError::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                reason: "endpoint cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, CosmosError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CosmosError::Closed);
        }

        let url = self.url_for(segments)?;
        let bearer = self.bearer().await?;
        let date = ms_date(OffsetDateTime::now_utc())?;
        let activity_id = Uuid::now_v7();

        tracing::debug!(%url, %activity_id, "cosmos request");

        let response = self
            .http
            .get(url.clone())
            .header("authorization", aad_authorization(&bearer))
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-activity-id", activity_id.to_string())
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|source| CosmosError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| CosmosError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !status.is_success() {
            let parsed: ServiceErrorBody = serde_json::from_str(&body).unwrap_or_default();
            let message = parsed
                .message
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            tracing::debug!(%url, status = status.as_u16(), code = ?parsed.code, "cosmos error response");
            return Err(CosmosError::Service {
                status: status.as_u16(),
                code: parsed.code,
                message,
            });
        }

        serde_json::from_str(&body).map_err(|source| CosmosError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Connected client for one Cosmos DB account.
pub struct CosmosClient {
    inner: Arc<ClientInner>,
    account: DatabaseAccount,
}

impl CosmosClient {
    /// Parse the endpoint, then read the account metadata. The read forces
    /// the first token acquisition, so credential problems surface here.
    pub async fn connect(
        http: reqwest::Client,
        endpoint: &str,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, CosmosError> {
        let url = Url::parse(endpoint).map_err(|err| CosmosError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CosmosError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        let scope = account_scope(&url)?;

        let inner = Arc::new(ClientInner {
            http,
            endpoint: url,
            scope,
            credential,
            token: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let account: DatabaseAccount = inner.get(&[]).await?;
        tracing::info!(
            account = %account.id,
            regions = account.readable_locations.len(),
            "read Cosmos DB account"
        );

        Ok(Self { inner, account })
    }

    pub fn account(&self) -> &DatabaseAccount {
        &self.account
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Handle for a database. No request is made.
    pub fn database_client(&self, id: &str) -> DatabaseClient {
        DatabaseClient {
            inner: self.inner.clone(),
            id: id.to_string(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Mark the session closed; later requests through any handle fail with
    /// [`CosmosError::Closed`].
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(endpoint = %self.inner.endpoint, "cosmos client closed");
        }
    }
}

pub struct DatabaseClient {
    inner: Arc<ClientInner>,
    id: String,
}

impl DatabaseClient {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle for a container. No request is made.
    pub fn container_client(&self, id: &str) -> ContainerClient {
        ContainerClient {
            inner: self.inner.clone(),
            database: self.id.clone(),
            id: id.to_string(),
        }
    }

    pub async fn read(&self) -> Result<ResourceProperties, CosmosError> {
        self.inner.get(&["dbs", self.id.as_str()]).await
    }
}

pub struct ContainerClient {
    inner: Arc<ClientInner>,
    database: String,
    id: String,
}

impl ContainerClient {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn database_id(&self) -> &str {
        &self.database
    }

    pub async fn read(&self) -> Result<ResourceProperties, CosmosError> {
        self.inner
            .get(&["dbs", self.database.as_str(), "colls", self.id.as_str()])
            .await
    }
}

/// [`Connector`] producing [`CosmosClient`]s.
#[derive(Clone, Default)]
pub struct CosmosConnector {
    http: reqwest::Client,
}

impl CosmosConnector {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Connector for CosmosConnector {
    type Client = CosmosClient;

    async fn connect(
        &self,
        endpoint: &str,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<CosmosClient, CosmosError> {
        CosmosClient::connect(self.http.clone(), endpoint, credential).await
    }
}

#[async_trait]
impl CosmosService for CosmosClient {
    type Database = DatabaseClient;

    async fn database(&self, id: &str) -> Result<DatabaseClient, CosmosError> {
        Ok(self.database_client(id))
    }

    fn close(&mut self) {
        CosmosClient::close(self);
    }
}

#[async_trait]
impl DatabaseHandle for DatabaseClient {
    type Container = ContainerClient;

    async fn container(&self, id: &str) -> Result<ContainerClient, CosmosError> {
        Ok(self.container_client(id))
    }

    async fn validate(&self) -> Result<(), CosmosError> {
        let properties = self.read().await?;
        tracing::debug!(database = %properties.id, rid = %properties.rid, "database exists");
        Ok(())
    }
}

#[async_trait]
impl ContainerHandle for ContainerClient {
    async fn validate(&self) -> Result<(), CosmosError> {
        let properties = self.read().await?;
        tracing::debug!(container = %properties.id, rid = %properties.rid, "container exists");
        Ok(())
    }
}
