//! Cognitive orchestrator: the bounded tool-calling loop.
//!
//! One cycle per drained sender batch: resolve the strategy, load context,
//! loop `THINKING → (TOOL_REQUESTED → EXECUTING → THINKING)* → DONE` within
//! `max_turns`, persist exactly the user text and the final assistant text.

use crate::agent::roles::{self, Role};
use crate::config::{AgentConfig, RoleIdentities, digits_only};
use crate::error::Result;
use crate::llm::{ChatTurn, CompletionRequest, ModelBackend, ModelReply};
use crate::store::LeadStore;
use crate::tools::ToolRegistry;
use crate::transport::Transport;
use crate::SenderMeta;
use std::sync::Arc;

/// Non-empty holding reply used when the turn bound is exhausted without any
/// final text from the model.
const HOLDING_REPLY: &str =
    "Sigo revisando tu consulta, dame un momento y te confirmo. ✨";

/// Tool-result text synthesized for a call outside the role's allow-list.
const PERMISSION_DENIED: &str =
    "Permission Denied: this tool is not available in this conversation.";

/// Result of one completed processing cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub reply: String,
    pub role: Role,
    pub lead_id: i64,
    pub is_new_lead: bool,
}

/// Runs the tool-calling loop for every role.
pub struct Orchestrator {
    backend: Arc<dyn ModelBackend>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn LeadStore>,
    transport: Arc<dyn Transport>,
    identities: RoleIdentities,
    settings: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn LeadStore>,
        transport: Arc<dyn Transport>,
        identities: RoleIdentities,
        settings: AgentConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            store,
            transport,
            identities,
            settings,
        }
    }

    /// Run one full cycle for a sender's combined text.
    #[tracing::instrument(skip(self, text, meta), fields(sender = %sender))]
    pub async fn run_cycle(
        &self,
        sender: &str,
        text: &str,
        meta: &SenderMeta,
    ) -> Result<CycleOutcome> {
        let sender = digits_only(sender);
        let strategy = roles::resolve(&sender, &self.identities);
        let role = strategy.role();

        tracing::info!(role = %role, "cycle started");

        let (lead_id, is_new_lead) = self.store.get_or_create_lead(&sender, meta).await?;

        // Context is loaded before the new text is persisted so the model
        // sees the batch exactly once (as the live user turn).
        let history = self
            .store
            .get_history(&sender, self.settings.history_limit)
            .await?;
        let knowledge = self.store.get_knowledge(None).await?;

        self.store.log_interaction(lead_id, "user", text).await?;

        let mut turns: Vec<ChatTurn> = history
            .into_iter()
            .map(|turn| {
                if turn.role == "assistant" {
                    ChatTurn::Assistant { text: turn.content }
                } else {
                    ChatTurn::User { text: turn.content }
                }
            })
            .collect();
        turns.push(ChatTurn::User { text: text.to_string() });

        let allowed = strategy.allowed_tools();
        let request_template = CompletionRequest {
            system_instruction: strategy.system_prompt(&sender, &knowledge),
            turns: Vec::new(),
            tools: self.registry.schemas_for_names(allowed),
        };

        let mut final_text: Option<String> = None;
        for round in 0..self.settings.max_turns.max(1) {
            let mut request = request_template.clone();
            request.turns = turns.clone();

            match self.backend.complete(&request).await? {
                ModelReply::Text(reply) => {
                    tracing::debug!(round, "model returned final text");
                    final_text = Some(reply);
                    break;
                }
                ModelReply::ToolCall { name, args } => {
                    turns.push(ChatTurn::ToolCall {
                        name: name.clone(),
                        args: args.clone(),
                    });

                    let output = if allowed.contains(&name.as_str()) {
                        self.registry.execute(&name, args).await
                    } else {
                        // Intercepted before the registry: the tool function
                        // must never run for an out-of-list request.
                        tracing::warn!(
                            tool = %name,
                            role = %role,
                            "security event: tool request outside role allow-list"
                        );
                        PERMISSION_DENIED.to_string()
                    };

                    turns.push(ChatTurn::ToolResult { name, output });
                }
            }
        }

        let reply = match final_text {
            Some(reply) if !reply.trim().is_empty() => reply,
            _ => {
                tracing::warn!(max_turns = self.settings.max_turns, "turn bound exhausted, using holding reply");
                HOLDING_REPLY.to_string()
            }
        };

        self.store.log_interaction(lead_id, "assistant", &reply).await?;

        if role == Role::Client && self.matches_escalation(&reply) {
            self.spawn_supervisor_consultation(&sender, text);
        }

        tracing::info!(role = %role, chars = reply.chars().count(), "cycle completed");
        Ok(CycleOutcome {
            reply,
            role,
            lead_id,
            is_new_lead,
        })
    }

    /// The reply text itself is the escalation trigger (kept as shipped; see
    /// DESIGN.md for the open question on making this a tool).
    fn matches_escalation(&self, reply: &str) -> bool {
        let lowered = reply.to_lowercase();
        self.settings
            .escalation_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
    }

    /// Fire-and-forget a consultation request to the supervisor's channel.
    /// Failure is logged and never affects the reply already produced.
    fn spawn_supervisor_consultation(&self, client: &str, question: &str) {
        let transport = self.transport.clone();
        let supervisor = self.identities.supervisor.clone();
        let message = format!(
            "*CONSULTA URGENTE*\n\n\
             Tengo una clienta con una duda que requiere tu criterio:\n\n\
             Cliente: {client}\n\
             Mensaje: {question}\n\n\
             ¿Cómo debería proceder? Respóndeme por aquí para informarle."
        );
        tracing::info!(client = %client, "supervisor consultation triggered");
        tokio::spawn(async move {
            if let Err(error) = transport.send_text(&supervisor, &message).await {
                tracing::warn!(%error, "supervisor consultation delivery failed");
            }
        });
    }
}
