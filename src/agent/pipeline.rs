//! Batch pipeline: orchestrate → reply, with the shield on the error path.

use crate::agent::orchestrator::Orchestrator;
use crate::agent::roles;
use crate::config::{RoleIdentities, digits_only};
use crate::error::Result;
use crate::inbox::{BatchHandler, DrainedBatch};
use crate::shield::Shield;
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;

/// Production consumer of drained batches: runs the cognitive cycle and
/// dispatches the reply. Any cycle failure is translated by the shield into
/// a role-appropriate message, so a sender never sees a raw error.
pub struct AgentPipeline {
    orchestrator: Orchestrator,
    transport: Arc<dyn Transport>,
    shield: Shield,
    identities: RoleIdentities,
}

impl AgentPipeline {
    pub fn new(
        orchestrator: Orchestrator,
        transport: Arc<dyn Transport>,
        shield: Shield,
        identities: RoleIdentities,
    ) -> Self {
        Self {
            orchestrator,
            transport,
            shield,
            identities,
        }
    }
}

#[async_trait]
impl BatchHandler for AgentPipeline {
    async fn handle_batch(&self, batch: &DrainedBatch) -> Result<()> {
        match self
            .orchestrator
            .run_cycle(&batch.sender, &batch.text, &batch.meta)
            .await
        {
            Ok(outcome) => {
                self.transport.send_text(&batch.sender, &outcome.reply).await?;
                Ok(())
            }
            Err(error) => {
                let role = roles::resolve(&digits_only(&batch.sender), &self.identities).role();
                let reply = self.shield.handle(&error, &batch.sender, role);
                self.transport.send_text(&batch.sender, &reply).await?;
                Ok(())
            }
        }
    }
}
