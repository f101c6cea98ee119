//! Sinks for published forms.
//!
//! The system treats the document store as opaque: it takes a
//! [`FormRecord`] and hands back the id it filed it under.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::codec::{FormCodec, MsgPackCodec};
use crate::error::StoreError;
use crate::form::{FormId, FormRecord};
use crate::question::Question;

pub trait DocumentStore: Send + Sync {
    fn push(&self, record: &FormRecord) -> impl Future<Output = Result<FormId, StoreError>> + Send;
}

/// A published form as the in-memory store keeps it, with the server
/// timestamp resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredForm {
    pub id: FormId,
    pub title: String,
    pub instructions: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

/// Process-local store. Documents are kept MessagePack-encoded.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<DashMap<FormId, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &FormId) -> Result<Option<StoredForm>, StoreError> {
        match self.docs.get(id) {
            Some(bytes) => MsgPackCodec.decode(bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    async fn push(&self, record: &FormRecord) -> Result<FormId, StoreError> {
        let id = FormId(Uuid::new_v4().simple().to_string());
        let stored = StoredForm {
            id: id.clone(),
            title: record.title.clone(),
            instructions: record.instructions.clone(),
            questions: record.questions.clone(),
            created_at: Utc::now(),
        };
        let bytes = MsgPackCodec.encode(&stored)?;
        self.docs.insert(id.clone(), bytes);
        info!(form_id = %id, questions = record.questions.len(), "stored form in memory");
        Ok(id)
    }
}

const FIREBASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Firebase Realtime Database over its REST API. Forms are pushed under
/// `/forms`, and the database assigns both the key and `createdAt`.
pub struct FirebaseStore {
    http: Client,
    database_url: String,
    auth: Option<String>,
}

impl FirebaseStore {
    pub fn new(database_url: String, auth: Option<String>) -> Self {
        Self {
            http: Client::new(),
            database_url,
            auth,
        }
    }
}

impl DocumentStore for FirebaseStore {
    async fn push(&self, record: &FormRecord) -> Result<FormId, StoreError> {
        #[derive(Deserialize)]
        struct PushReply {
            name: String,
        }

        let url = format!("{}/forms.json", self.database_url.trim_end_matches('/'));
        let mut req = self.http.post(&url).timeout(FIREBASE_TIMEOUT).json(record);
        if let Some(auth) = &self.auth {
            req = req.query(&[("auth", auth)]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("{e}. URL: {url}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, body });
        }

        let reply: PushReply = resp
            .json()
            .await
            .map_err(|e| StoreError::MalformedReply(e.to_string()))?;
        info!(form_id = %reply.name, "pushed form to firebase");
        Ok(FormId(reply.name))
    }
}

/// The store selected by configuration.
pub enum Store {
    Memory(MemoryStore),
    Firebase(FirebaseStore),
}

impl Store {
    pub fn memory(&self) -> Option<&MemoryStore> {
        match self {
            Store::Memory(m) => Some(m),
            Store::Firebase(_) => None,
        }
    }
}

impl DocumentStore for Store {
    async fn push(&self, record: &FormRecord) -> Result<FormId, StoreError> {
        match self {
            Store::Memory(s) => s.push(record).await,
            Store::Firebase(s) => s.push(record).await,
        }
    }
}
