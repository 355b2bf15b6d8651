//! Safe customer-facing tools.

use super::{ToolDef, ToolExecutionError, parse_args};
use crate::agent::roles::Role;
use crate::store::LeadStore;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct AvailabilityArgs {
    service_name: String,
}

/// Appointment availability lookup.
pub fn check_availability() -> ToolDef {
    ToolDef::new(
        "check_availability",
        "Consulta disponibilidad de citas en la agenda para un servicio.",
        vec![Role::Client, Role::Supervisor, Role::Root],
        serde_json::json!({
            "type": "object",
            "properties": {
                "service_name": {
                    "type": "string",
                    "description": "Ej. 'microblading'"
                }
            },
            "required": ["service_name"]
        }),
        Arc::new(move |args| {
            Box::pin(async move {
                let args: AvailabilityArgs = parse_args(args)?;
                // Agenda integration is pending; this mirrors the studio's
                // standing weekly slots.
                let reply = if args.service_name.to_lowercase().contains("micro") {
                    "Hay disponibilidad para microblading este jueves a las 15:00 y viernes a las 10:00."
                } else {
                    "Tengo disponibilidad general toda la semana para consultas de valoración."
                };
                Ok(reply.to_string())
            })
        }),
    )
}

/// Current service catalog and active promotions, knowledge-base backed.
pub fn get_services_prices(store: Arc<dyn LeadStore>) -> ToolDef {
    ToolDef::new(
        "get_services_prices",
        "Lista de servicios con precios y promociones vigentes.",
        vec![Role::Client, Role::Supervisor, Role::Root],
        serde_json::json!({"type": "object", "properties": {}}),
        Arc::new(move |_args| {
            let store = store.clone();
            Box::pin(async move {
                let mut lines = Vec::new();
                for category in ["services", "promo"] {
                    let facts = store
                        .get_knowledge(Some(category))
                        .await
                        .map_err(|error| ToolExecutionError(error.to_string()))?;
                    lines.extend(facts.into_iter().map(|f| f.fact));
                }
                if lines.is_empty() {
                    return Ok("No hay catálogo cargado todavía.".to_string());
                }
                Ok(lines.join("\n"))
            })
        }),
    )
}

/// Current date and time, for scheduling talk.
pub fn get_current_date() -> ToolDef {
    ToolDef::new(
        "get_current_date",
        "Devuelve la fecha y hora actual. Úsala para 'mañana', 'el jueves', etc.",
        vec![Role::Client, Role::Supervisor, Role::Root],
        serde_json::json!({"type": "object", "properties": {}}),
        Arc::new(move |_args| {
            Box::pin(async move {
                Ok(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
            })
        }),
    )
}
