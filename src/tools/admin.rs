//! Diagnostic tools for the Root role.

use super::{ToolDef, parse_args};
use crate::agent::roles::Role;
use crate::store::LeadStore;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct SqlArgs {
    query: String,
}

/// Read-only SQL audit queries. The SELECT-only guard lives both here and in
/// the store, so neither layer can be bypassed alone.
pub fn run_readonly_sql(store: Arc<dyn LeadStore>) -> ToolDef {
    ToolDef::new(
        "run_readonly_sql",
        "Ejecuta una consulta SQL SELECT para auditoría del sistema. Solo modo admin.",
        vec![Role::Root],
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "La consulta SELECT SQL."
                }
            },
            "required": ["query"]
        }),
        Arc::new(move |args| {
            let store = store.clone();
            Box::pin(async move {
                let args: SqlArgs = parse_args(args)?;
                if !args.query.trim_start().to_uppercase().starts_with("SELECT") {
                    return Ok("SECURITY ERROR: only SELECT queries are allowed.".to_string());
                }
                store
                    .read_only_query(&args.query)
                    .await
                    .map_err(|error| super::ToolExecutionError(error.to_string()))
            })
        }),
    )
}

/// Liveness probe answered from process state.
pub fn get_system_status() -> ToolDef {
    ToolDef::new(
        "get_system_status",
        "Devuelve el estado de salud actual del sistema.",
        vec![Role::Root, Role::Supervisor],
        serde_json::json!({"type": "object", "properties": {}}),
        Arc::new(move |_args| {
            Box::pin(async move {
                Ok(format!(
                    "Frontdesk v{} OPERATIONAL. Gateway y base de datos conectados.",
                    env!("CARGO_PKG_VERSION")
                ))
            })
        }),
    )
}
