//! Business tools for the Supervisor role.

use super::{ToolDef, ToolExecutionError, parse_args};
use crate::agent::roles::Role;
use crate::store::LeadStore;
use serde::Deserialize;
use std::sync::Arc;

/// Lead and interaction counters for the owner's report.
pub fn get_sales_report(store: Arc<dyn LeadStore>) -> ToolDef {
    ToolDef::new(
        "get_sales_report",
        "Resumen de leads e interacciones del negocio.",
        vec![Role::Supervisor],
        serde_json::json!({"type": "object", "properties": {}}),
        Arc::new(move |_args| {
            let store = store.clone();
            Box::pin(async move {
                let stats = store
                    .lead_stats()
                    .await
                    .map_err(|error| ToolExecutionError(error.to_string()))?;
                Ok(format!(
                    "Reporte: {} leads en total ({} hoy), {} interacciones registradas.",
                    stats.total_leads, stats.leads_today, stats.interactions
                ))
            })
        }),
    )
}

#[derive(Debug, Deserialize)]
struct DiscountArgs {
    service: String,
    percent: f64,
    #[serde(default)]
    note: Option<String>,
}

/// Records an owner-approved promotion as a knowledge fact. The client
/// persona reads the knowledge base on every cycle, so the promotion applies
/// to future conversations immediately.
pub fn approve_discount(store: Arc<dyn LeadStore>) -> ToolDef {
    ToolDef::new(
        "approve_discount",
        "Registra un descuento aprobado por el jefe para aplicarlo a clientas futuras.",
        vec![Role::Supervisor],
        serde_json::json!({
            "type": "object",
            "properties": {
                "service": {
                    "type": "string",
                    "description": "Servicio al que aplica (ej. 'microblading')."
                },
                "percent": {
                    "type": "number",
                    "description": "Porcentaje de descuento aprobado."
                },
                "note": {
                    "type": "string",
                    "description": "Condición opcional (ej. 'solo esta semana')."
                }
            },
            "required": ["service", "percent"]
        }),
        Arc::new(move |args| {
            let store = store.clone();
            Box::pin(async move {
                let args: DiscountArgs = parse_args(args)?;
                if !(0.0..=100.0).contains(&args.percent) {
                    return Ok("El porcentaje debe estar entre 0 y 100.".to_string());
                }
                let fact = match &args.note {
                    Some(note) => format!(
                        "{:.0}% de descuento en {} ({note})",
                        args.percent, args.service
                    ),
                    None => format!("{:.0}% de descuento en {}", args.percent, args.service),
                };
                store
                    .record_knowledge("promo", &fact)
                    .await
                    .map_err(|error| ToolExecutionError(error.to_string()))?;
                Ok(format!("Registrado: {fact}. Ya aplica a clientas futuras."))
            })
        }),
    )
}
