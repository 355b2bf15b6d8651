//! Failure shield: classifies pipeline errors into safe, role-appropriate
//! replies and raises a best-effort admin alert.

use crate::agent::roles::Role;
use crate::config::digits_only;
use crate::error::Error;
use crate::transport::AdminNotifier;

/// Failure categories surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Llm,
    Persistence,
    Transport,
    Logic,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Llm => write!(f, "LLM_FAILURE"),
            FailureKind::Persistence => write!(f, "PERSISTENCE_FAILURE"),
            FailureKind::Transport => write!(f, "TRANSPORT_FAILURE"),
            FailureKind::Logic => write!(f, "LOGIC_ERROR"),
        }
    }
}

/// Classify an error by its typed variant. Timeouts anywhere count as
/// connectivity trouble, not model trouble.
pub fn classify(error: &Error) -> FailureKind {
    match error {
        Error::Llm(crate::error::LlmError::Timeout) => FailureKind::Transport,
        Error::Llm(_) => FailureKind::Llm,
        Error::Store(_) | Error::Sqlx(_) => FailureKind::Persistence,
        Error::Transport(_) => FailureKind::Transport,
        _ => FailureKind::Logic,
    }
}

/// Intercepts failures and converts them into classified outcomes.
pub struct Shield {
    notifier: AdminNotifier,
    /// Digits-only admin number, used to break alert loops.
    admin: String,
}

impl Shield {
    pub fn new(notifier: AdminNotifier, admin: impl Into<String>) -> Self {
        Self {
            notifier,
            admin: admin.into(),
        }
    }

    /// Produce the reply for a failed cycle and raise the admin alert.
    ///
    /// Root/Supervisor senders get a technical summary; clients get a
    /// brand-safe apology. The alert is skipped when the failing sender IS
    /// the admin, so a broken admin chat cannot alert itself in a loop.
    pub fn handle(&self, error: &Error, sender: &str, role: Role) -> String {
        let kind = classify(error);
        let detail = truncate(&error.to_string(), 300);

        tracing::error!(
            sender = %sender,
            code = %kind,
            %error,
            "shield intercepted cycle failure"
        );

        if digits_only(sender) != self.admin {
            self.notifier.notify(format!(
                "*WATCHDOG*\nUser {sender} hit {kind}.\nDetail: {detail}"
            ));
        }

        match role {
            Role::Root | Role::Supervisor => {
                format!("SYSTEM ALERT\nCode: {kind}\nError: {detail}\nRevisa los logs del servidor.")
            }
            Role::Client => apology(kind).to_string(),
        }
    }
}

/// Pre-authored brand-safe copy per failure category.
fn apology(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Llm => {
            "Disculpa, estoy analizando tu caso con mucha profundidad y necesito un segundo. 🧠 \
             ¿Me repites lo último?"
        }
        FailureKind::Persistence => {
            "Estoy sincronizando mi agenda en tiempo real y la señal está oscilando. Dame un \
             minuto. 🗓️"
        }
        FailureKind::Transport => {
            "La conexión de WhatsApp está un poco lenta. ¿Podrías repetirme eso? 📶"
        }
        FailureKind::Logic => {
            "Estoy actualizando mis listas de precios y servicios. Un momento por favor. 💎"
        }
    }
}

fn truncate(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &value[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, StoreError, TransportError};
    use crate::test_support::RecordingTransport;
    use std::sync::Arc;

    fn shield(transport: Arc<RecordingTransport>) -> Shield {
        Shield::new(
            AdminNotifier::new(transport, "59170000001"),
            "59170000001",
        )
    }

    async fn drain_spawned_tasks() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn classification_follows_error_variants() {
        assert_eq!(
            classify(&Error::Llm(LlmError::EmptyResponse)),
            FailureKind::Llm
        );
        assert_eq!(
            classify(&Error::Store(StoreError::Rejected("x".into()))),
            FailureKind::Persistence
        );
        assert_eq!(
            classify(&Error::Transport(TransportError::Timeout)),
            FailureKind::Transport
        );
        // A model timeout is connectivity trouble, not model trouble.
        assert_eq!(
            classify(&Error::Llm(LlmError::Timeout)),
            FailureKind::Transport
        );
        assert_eq!(
            classify(&Error::Other(anyhow::anyhow!("bug"))),
            FailureKind::Logic
        );
    }

    #[tokio::test]
    async fn client_gets_category_apology_not_raw_error() {
        let transport = Arc::new(RecordingTransport::default());
        let shield = shield(transport.clone());

        let reply = shield.handle(
            &Error::Transport(TransportError::Timeout),
            "59170009999",
            Role::Client,
        );
        drain_spawned_tasks().await;

        assert_eq!(reply, apology(FailureKind::Transport));
        assert!(!reply.contains("timed out"));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "59170000001");
        assert!(sent[0].1.contains("TRANSPORT_FAILURE"));
        assert!(sent[0].1.contains("59170009999"));
    }

    #[tokio::test]
    async fn privileged_roles_get_technical_summary() {
        let transport = Arc::new(RecordingTransport::default());
        let shield = shield(transport.clone());

        let reply = shield.handle(
            &Error::Llm(LlmError::EmptyResponse),
            "59170000002",
            Role::Supervisor,
        );
        drain_spawned_tasks().await;

        assert!(reply.contains("LLM_FAILURE"));
        assert!(reply.contains("no usable candidate"));
    }

    #[tokio::test]
    async fn admin_sender_does_not_alert_itself() {
        let transport = Arc::new(RecordingTransport::default());
        let shield = shield(transport.clone());

        shield.handle(&Error::Llm(LlmError::Timeout), "59170000001", Role::Root);
        drain_spawned_tasks().await;

        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn alert_failure_is_swallowed() {
        let transport = Arc::new(RecordingTransport::failing());
        let shield = shield(transport.clone());

        // Must still return a reply even though the alert cannot be sent.
        let reply = shield.handle(
            &Error::Other(anyhow::anyhow!("boom")),
            "59170009999",
            Role::Client,
        );
        drain_spawned_tasks().await;
        assert!(!reply.is_empty());
    }
}
