//! Tool registry: invokable capabilities with declarative schemas.
//!
//! Tools are organized by audience: `admin` (diagnostics), `business`
//! (owner reporting and overrides), `client` (safe customer-facing lookups).
//! The registry itself is permission-blind; role restriction happens in the
//! orchestrator before a call ever reaches `execute`.

pub mod admin;
pub mod business;
pub mod client;

use crate::agent::roles::Role;
use crate::llm::ToolSchema;
use crate::store::LeadStore;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Error produced by a tool handler. Always rendered back to the model as a
/// string, never propagated.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ToolExecutionError(pub String);

/// Async tool handler: JSON argument object in, result text out.
pub type ToolHandler = Arc<
    dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<String, ToolExecutionError>>
        + Send
        + Sync,
>;

/// A registered tool: schema, role visibility, and handler.
#[derive(Clone)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// JSON Schema object for the tool's arguments, authored per tool.
    pub parameters: serde_json::Value,
    /// Roles whose default tool set includes this tool.
    pub roles: Vec<Role>,
    handler: ToolHandler,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        roles: Vec<Role>,
        parameters: serde_json::Value,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            roles,
            handler,
        }
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

impl std::fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDef")
            .field("name", &self.name)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// Catalog of invokable capabilities.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDef>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Idempotent by name: a re-registration replaces the
    /// previous definition.
    pub fn register(&mut self, def: ToolDef) {
        let name = def.name.clone();
        let roles = def.roles.clone();
        if self.tools.insert(name.clone(), def).is_some() {
            tracing::debug!(tool = %name, "tool re-registered, previous definition replaced");
        }
        tracing::info!(tool = %name, roles = ?roles, "tool registered");
    }

    /// Model-facing schemas for an explicit allow-list, in list order.
    /// Unknown names are skipped.
    pub fn schemas_for_names(&self, names: &[&str]) -> Vec<ToolSchema> {
        names
            .iter()
            .filter_map(|name| self.tools.get(*name).map(ToolDef::schema))
            .collect()
    }

    /// Model-facing schemas for every tool visible to a role.
    pub fn schemas_for_role(&self, role: Role) -> Vec<ToolSchema> {
        self.tools
            .values()
            .filter(|def| def.roles.contains(&role))
            .map(ToolDef::schema)
            .collect()
    }

    /// Execute a tool by name. Never fails: unknown names and handler errors
    /// are rendered as error strings the model can recover from.
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> String {
        let Some(def) = self.tools.get(name) else {
            tracing::warn!(tool = %name, "unknown tool requested");
            return format!("Error: tool '{name}' not found.");
        };

        tracing::info!(tool = %name, args = %args, "executing tool");
        match (def.handler)(args).await {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!(tool = %name, %error, "tool execution failed");
                format!("Error: {error}")
            }
        }
    }
}

/// Build the production registry with every tool wired to its backing store.
pub fn default_registry(store: Arc<dyn LeadStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(admin::run_readonly_sql(store.clone()));
    registry.register(admin::get_system_status());
    registry.register(business::get_sales_report(store.clone()));
    registry.register(business::approve_discount(store.clone()));
    registry.register(client::check_availability());
    registry.register(client::get_services_prices(store));
    registry.register(client::get_current_date());
    registry
}

/// Parse a tool's argument object, mapping serde failures to a tool error the
/// model can read and correct.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    args: serde_json::Value,
) -> Result<T, ToolExecutionError> {
    serde_json::from_value(args)
        .map_err(|error| ToolExecutionError(format!("invalid arguments: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_tool(name: &str, calls: Arc<AtomicUsize>) -> ToolDef {
        ToolDef::new(
            name,
            "test tool",
            vec![Role::Client],
            serde_json::json!({"type": "object", "properties": {}}),
            Arc::new(move |_args| {
                let calls = calls.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("ok".to_string())
                })
            }),
        )
    }

    #[tokio::test]
    async fn unknown_tool_returns_typed_error_string() {
        let registry = ToolRegistry::new();
        let output = registry.execute("nope", serde_json::json!({})).await;
        assert_eq!(output, "Error: tool 'nope' not found.");
    }

    #[tokio::test]
    async fn handler_errors_are_stringified() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDef::new(
            "boom",
            "always fails",
            vec![Role::Root],
            serde_json::json!({"type": "object", "properties": {}}),
            Arc::new(|_args| {
                Box::pin(async { Err(ToolExecutionError("backend unavailable".into())) })
            }),
        ));

        let output = registry.execute("boom", serde_json::json!({})).await;
        assert_eq!(output, "Error: backend unavailable");
    }

    #[tokio::test]
    async fn registration_is_idempotent_by_name() {
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));

        let mut registry = ToolRegistry::new();
        registry.register(counting_tool("dup", calls_a.clone()));
        registry.register(counting_tool("dup", calls_b.clone()));

        registry.execute("dup", serde_json::json!({})).await;
        assert_eq!(calls_a.load(Ordering::SeqCst), 0);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
        assert_eq!(registry.schemas_for_role(Role::Client).len(), 1);
    }

    #[test]
    fn schemas_follow_role_visibility() {
        let mut registry = ToolRegistry::new();
        registry.register(counting_tool("client_only", Arc::new(AtomicUsize::new(0))));

        assert_eq!(registry.schemas_for_role(Role::Client).len(), 1);
        assert!(registry.schemas_for_role(Role::Root).is_empty());

        let named = registry.schemas_for_names(&["client_only", "ghost"]);
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].name, "client_only");
    }
}
