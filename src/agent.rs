//! Role resolution and the cognitive orchestration loop.

pub mod orchestrator;
pub mod pipeline;
pub mod roles;

pub use orchestrator::{CycleOutcome, Orchestrator};
pub use pipeline::AgentPipeline;
pub use roles::{Role, Strategy, resolve};
