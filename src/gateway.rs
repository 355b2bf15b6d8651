//! Inbound gateway: payload normalization and the webhook server.

pub mod normalizer;
pub mod webhook;

pub use normalizer::normalize;
pub use webhook::{AppState, router, serve};
