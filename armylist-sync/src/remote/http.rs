//! HTTP document API remote store.
//!
//! Talks to a small REST document service:
//!
//! - `GET  {base}/v1/users/{uid}/sync/{document}` → document JSON, `404` if absent
//! - `POST {base}/v1/users/{uid}/sync:commit` with `{"writes": [...]}` → applied atomically
//!
//! Requests carry the signed-in user's ID token as a bearer token.

use super::storage::{RemoteStore, WriteBatch};
use crate::error::{SyncError, SyncResult};
use armylist_types::{DocumentName, Identity};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// HTTP remote configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRemoteConfig {
    /// Base URL of the document service (e.g. `https://sync.example.com`).
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct HttpRemoteStore {
    config: HttpRemoteConfig,
    client: Client,
    token: RwLock<Option<String>>,
}

impl HttpRemoteStore {
    /// Creates a new HTTP remote.
    pub fn new(config: HttpRemoteConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            token: RwLock::new(None),
        })
    }

    /// Sets the ID token sent with every request (`None` signs out).
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub fn config(&self) -> &HttpRemoteConfig {
        &self.config
    }

    async fn bearer(&self) -> SyncResult<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| SyncError::Auth("no ID token set".to_string()))
    }

    fn collection_url(&self, identity: &Identity) -> String {
        format!(
            "{}/v1/users/{}/sync",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(identity.as_str())
        )
    }

    async fn error_for(response: Response) -> SyncError {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            SyncError::Auth(format!("{status}: {message}"))
        } else {
            SyncError::Remote {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    writes: &'a WriteBatch,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    applied: Option<usize>,
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn provider_name(&self) -> &'static str {
        "HTTP"
    }

    async fn get_document(
        &self,
        identity: &Identity,
        document: DocumentName,
    ) -> SyncResult<Option<Value>> {
        let token = self.bearer().await?;
        let url = format!("{}/{}", self.collection_url(identity), document.as_str());
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("document fetch failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("failed to parse document: {e}")))?;
        Ok(Some(body))
    }

    async fn commit(&self, identity: &Identity, batch: WriteBatch) -> SyncResult<()> {
        let token = self.bearer().await?;
        let url = format!("{}:commit", self.collection_url(identity));
        debug!("POST {} ({} writes)", url, batch.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&CommitRequest { writes: &batch })
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("commit failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        // An empty body is a valid acknowledgement.
        let applied = response
            .json::<CommitResponse>()
            .await
            .ok()
            .and_then(|r| r.applied)
            .unwrap_or(batch.len());
        info!("Committed {} writes for {}", applied, identity);
        Ok(())
    }
}
