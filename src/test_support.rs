//! Hand-rolled mock implementations of the trait seams, shared across test
//! modules.

use crate::SenderMeta;
use crate::error::{LlmError, Result, StoreError, TransportError};
use crate::inbox::{BatchHandler, DrainedBatch};
use crate::llm::{CompletionRequest, ModelBackend, ModelReply};
use crate::store::{KnowledgeFact, LeadStats, LeadStore, StoredTurn};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Model backend that replays a scripted sequence of replies and records
/// every request it receives.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<std::result::Result<ModelReply, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<std::result::Result<ModelReply, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<ModelReply, LlmError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

/// In-memory `LeadStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreState>,
}

#[derive(Default)]
struct MemoryStoreState {
    leads: HashMap<String, i64>,
    next_lead_id: i64,
    /// (lead_id, role, content) in insertion order.
    interactions: Vec<(i64, String, String)>,
    knowledge: Vec<KnowledgeFact>,
}

impl MemoryStore {
    /// Interactions logged for a lead, as (role, content) pairs.
    pub fn interactions_for(&self, lead_id: i64) -> Vec<(String, String)> {
        self.inner
            .lock()
            .expect("store lock")
            .interactions
            .iter()
            .filter(|(id, _, _)| *id == lead_id)
            .map(|(_, role, content)| (role.clone(), content.clone()))
            .collect()
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn get_or_create_lead(
        &self,
        sender: &str,
        _meta: &SenderMeta,
    ) -> std::result::Result<(i64, bool), StoreError> {
        let mut state = self.inner.lock().expect("store lock");
        if let Some(id) = state.leads.get(sender) {
            return Ok((*id, false));
        }
        state.next_lead_id += 1;
        let id = state.next_lead_id;
        state.leads.insert(sender.to_string(), id);
        Ok((id, true))
    }

    async fn log_interaction(
        &self,
        lead_id: i64,
        role: &str,
        content: &str,
    ) -> std::result::Result<(), StoreError> {
        self.inner
            .lock()
            .expect("store lock")
            .interactions
            .push((lead_id, role.to_string(), content.to_string()));
        Ok(())
    }

    async fn get_history(
        &self,
        sender: &str,
        limit: u32,
    ) -> std::result::Result<Vec<StoredTurn>, StoreError> {
        let state = self.inner.lock().expect("store lock");
        let Some(lead_id) = state.leads.get(sender).copied() else {
            return Ok(Vec::new());
        };
        let turns: Vec<StoredTurn> = state
            .interactions
            .iter()
            .filter(|(id, _, _)| *id == lead_id)
            .map(|(_, role, content)| StoredTurn {
                role: role.clone(),
                content: content.clone(),
            })
            .collect();
        let skip = turns.len().saturating_sub(limit as usize);
        Ok(turns.into_iter().skip(skip).collect())
    }

    async fn get_knowledge(
        &self,
        category: Option<&str>,
    ) -> std::result::Result<Vec<KnowledgeFact>, StoreError> {
        let state = self.inner.lock().expect("store lock");
        Ok(state
            .knowledge
            .iter()
            .filter(|fact| category.is_none_or(|c| fact.category == c))
            .cloned()
            .collect())
    }

    async fn record_knowledge(
        &self,
        category: &str,
        fact: &str,
    ) -> std::result::Result<(), StoreError> {
        self.inner
            .lock()
            .expect("store lock")
            .knowledge
            .push(KnowledgeFact {
                category: category.to_string(),
                fact: fact.to_string(),
            });
        Ok(())
    }

    async fn lead_stats(&self) -> std::result::Result<LeadStats, StoreError> {
        let state = self.inner.lock().expect("store lock");
        Ok(LeadStats {
            total_leads: state.leads.len() as i64,
            leads_today: state.leads.len() as i64,
            interactions: state.interactions.len() as i64,
        })
    }

    async fn read_only_query(&self, sql: &str) -> std::result::Result<String, StoreError> {
        if !sql.trim_start().to_uppercase().starts_with("SELECT") {
            return Err(StoreError::Rejected("only SELECT queries are allowed".into()));
        }
        Ok("[]".to_string())
    }
}

/// Transport that records every send; optionally fails them all.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// (recipient, text) pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> std::result::Result<bool, TransportError> {
        if self.fail {
            return Err(TransportError::Timeout);
        }
        self.sent
            .lock()
            .expect("sent lock")
            .push((recipient.to_string(), text.to_string()));
        Ok(true)
    }
}

/// Batch handler that records drained batches; optionally fails them all.
#[derive(Default)]
pub struct RecordingHandler {
    batches: Mutex<Vec<DrainedBatch>>,
    fail: bool,
}

impl RecordingHandler {
    pub fn failing() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn batches(&self) -> Vec<DrainedBatch> {
        self.batches.lock().expect("batches lock").clone()
    }
}

#[async_trait]
impl BatchHandler for RecordingHandler {
    async fn handle_batch(&self, batch: &DrainedBatch) -> Result<()> {
        self.batches
            .lock()
            .expect("batches lock")
            .push(batch.clone());
        if self.fail {
            return Err(crate::error::Error::Other(anyhow::anyhow!(
                "simulated pipeline failure"
            )));
        }
        Ok(())
    }
}
