//! Request/response channel
//!
//! [`ChatApi`] is the seam between the coordinator and the backend's HTTP
//! API; [`HttpChatApi`] is the reqwest implementation.
//!
//! Endpoints:
//!
//! - `POST /messages` creates a message and answers with its id
//! - `GET /messages/{wa_id}` returns the conversation's history
//! - `POST /delivered` / `POST /read` change a status, with
//!   `POST /messages/{msg_id}/{status}` as fallback

use async_trait::async_trait;
use reqwest::Client;

use crate::client::config::Config;
use crate::client::sync::error::SyncError;
use crate::shared::messaging::{
    ConversationId, CreateMessageRequest, CreateMessageResponse, MessageStatus, RawMessageRecord,
    SetStatusRequest,
};

/// Outbound operations the coordinator needs from the backend
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Create a message; returns the server id when the response carries one
    async fn create_message(
        &self,
        request: &CreateMessageRequest,
    ) -> Result<Option<String>, SyncError>;

    /// Fetch the ordered history of a conversation
    async fn history(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<RawMessageRecord>, SyncError>;

    /// Change a message's status on the server
    async fn set_status(
        &self,
        backend_id: &str,
        conversation_id: &ConversationId,
        status: MessageStatus,
    ) -> Result<(), SyncError>;
}

/// reqwest-backed [`ChatApi`]
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    config: Config,
    client: Client,
}

impl HttpChatApi {
    pub fn new(config: Config) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::network("client-setup", e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Use an existing client (shares its connection pool)
    pub fn with_client(config: Config, client: Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn create_message(
        &self,
        request: &CreateMessageRequest,
    ) -> Result<Option<String>, SyncError> {
        const OP: &str = "create-message";
        let url = self.config.endpoint(&["messages"])?;
        tracing::debug!(conversation_id = %request.conversation_id, "[SYNC] POST {}", url);

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| SyncError::network(OP, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(SyncError::network(OP, format!("{} - {}", status, body)));
        }

        let created: CreateMessageResponse = response
            .json()
            .await
            .map_err(|e| SyncError::network(OP, format!("unreadable response: {}", e)))?;
        Ok(created.backend_id().map(str::to_string))
    }

    async fn history(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<RawMessageRecord>, SyncError> {
        const OP: &str = "history";
        let url = self.config.endpoint(&["messages", conversation_id.as_str()])?;
        tracing::debug!(conversation_id = %conversation_id, "[SYNC] GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::network(OP, e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::network(OP, response.status().to_string()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::network(OP, format!("unreadable response: {}", e)))?;
        Ok(decode_history(conversation_id, body))
    }

    async fn set_status(
        &self,
        backend_id: &str,
        conversation_id: &ConversationId,
        status: MessageStatus,
    ) -> Result<(), SyncError> {
        const OP: &str = "set-status";
        let primary = self.config.endpoint(&[status.as_str()])?;
        let body = SetStatusRequest {
            msg_id: backend_id.to_string(),
            conversation_id: conversation_id.clone(),
        };

        let first = self
            .client
            .post(primary)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::network(OP, e.to_string()))?;
        if first.status().is_success() {
            return Ok(());
        }
        tracing::debug!(
            backend_id,
            status = %first.status(),
            "[SYNC] Status endpoint rejected update, trying per-message route"
        );

        let fallback = self
            .config
            .endpoint(&["messages", backend_id, status.as_str()])?;
        let second = self
            .client
            .post(fallback)
            .send()
            .await
            .map_err(|e| SyncError::network(OP, e.to_string()))?;
        if second.status().is_success() {
            Ok(())
        } else {
            Err(SyncError::network(
                OP,
                format!("server did not accept {} update ({})", status, second.status()),
            ))
        }
    }
}

/// Decode a history body. Non-array bodies count as an empty history and
/// undecodable entries are skipped.
pub fn decode_history(conversation_id: &ConversationId, body: serde_json::Value) -> Vec<RawMessageRecord> {
    let serde_json::Value::Array(entries) = body else {
        tracing::warn!(conversation_id = %conversation_id, "[SYNC] History response is not a list");
        return Vec::new();
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawMessageRecord>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, "[SYNC] Skipping undecodable history entry: {}", e);
                None
            }
        })
        .collect()
}
