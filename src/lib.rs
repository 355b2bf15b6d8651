//! Frontdesk: an agentic WhatsApp concierge with per-sender message
//! coalescing and role-scoped tool dispatch.

pub mod agent;
pub mod config;
pub mod error;
pub mod gateway;
pub mod inbox;
pub mod llm;
pub mod security;
pub mod shield;
pub mod store;
pub mod tools;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form metadata attached to a sender's buffer (display name, source
/// platform, campaign attribution). Merged across messages of one burst.
pub type SenderMeta = HashMap<String, serde_json::Value>;

/// Content shape the normalizer extracted the text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain `conversation` text.
    Text,
    /// Quoted/extended text message.
    ExtendedText,
    /// Caption carried on an image, video, or document.
    MediaCaption,
    /// Unsupported media rendered as a bracketed placeholder label.
    MediaPlaceholder,
}

/// Canonical inbound message produced by the gateway normalizer.
///
/// Consumed once folded into a sender's buffer; never retained afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMessage {
    /// Digits-only normalized sender identifier.
    pub sender: String,
    pub text: String,
    pub kind: MessageKind,
    /// Push name reported by the gateway, if any.
    pub display_name: Option<String>,
    /// Gateway that produced the payload (e.g. `evolution_v2`).
    pub source: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Gateway message id, if present.
    pub id: Option<String>,
}

impl CanonicalMessage {
    /// Buffer metadata derived from this message (merged into the sender's
    /// existing meta on arrival).
    pub fn meta(&self) -> SenderMeta {
        let mut meta = SenderMeta::new();
        if let Some(name) = &self.display_name {
            meta.insert("name".into(), serde_json::Value::from(name.clone()));
        }
        meta.insert("source".into(), serde_json::Value::from(self.source.clone()));
        meta
    }
}
