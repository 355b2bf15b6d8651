//! Sender roles and their cognitive strategies.
//!
//! Every sender resolves to exactly one role. The same orchestration code
//! runs for all of them; only the persona text and the allowed tool set
//! vary.

use crate::config::RoleIdentities;
use crate::store::KnowledgeFact;
use serde::{Deserialize, Serialize};

/// Closed set of sender roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Administrator / developer: full diagnostics.
    Root,
    /// Business owner: reporting and overrides.
    Supervisor,
    /// Everyone else: customer-facing sales persona.
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Root => write!(f, "root"),
            Role::Supervisor => write!(f, "supervisor"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// A capability-and-persona bundle selected per sender identity.
pub trait Strategy: Send + Sync {
    fn role(&self) -> Role;

    /// Persona text sent as the system instruction. May embed knowledge-base
    /// facts and the sender id.
    fn system_prompt(&self, sender: &str, knowledge: &[KnowledgeFact]) -> String;

    /// Tool names this strategy may invoke.
    fn allowed_tools(&self) -> &'static [&'static str];
}

/// Resolve the strategy for a digits-normalized sender id.
pub fn resolve(sender: &str, identities: &RoleIdentities) -> &'static dyn Strategy {
    if sender == identities.admin {
        &RootStrategy
    } else if sender == identities.supervisor {
        &SupervisorStrategy
    } else {
        &ClientStrategy
    }
}

const BASE_PERSONA: &str = "Eres NATI, la asistente de inteligencia artificial del estudio de \
                            micropigmentación. No eres un simple bot: razonas, usas herramientas \
                            y respondes como una persona real.";

/// Administrator persona: technical, terse, full diagnostics.
pub struct RootStrategy;

impl Strategy for RootStrategy {
    fn role(&self) -> Role {
        Role::Root
    }

    fn system_prompt(&self, sender: &str, _knowledge: &[KnowledgeFact]) -> String {
        format!(
            "{BASE_PERSONA}\n\
             ESTADO: PROTOCOLO ROOT ACTIVADO.\n\
             USUARIO: {sender} (desarrollador / admin del sistema).\n\
             REGLAS:\n\
             - Tienes acceso total. Para métricas o auditoría usa tus herramientas de agente.\n\
             - Puedes discutir arquitectura y estado del sistema sin rodeos.\n\
             - Tono técnico, lacónico y eficiente. Confirma que operas en nivel root."
        )
    }

    fn allowed_tools(&self) -> &'static [&'static str] {
        &["run_readonly_sql", "get_system_status", "get_current_date"]
    }
}

/// Business-owner persona: reporting, approvals, overrides.
pub struct SupervisorStrategy;

impl Strategy for SupervisorStrategy {
    fn role(&self) -> Role {
        Role::Supervisor
    }

    fn system_prompt(&self, sender: &str, knowledge: &[KnowledgeFact]) -> String {
        format!(
            "{BASE_PERSONA}\n\
             ESTADO: PROTOCOLO JEFE ACTIVADO.\n\
             USUARIO: {sender} (esteticista jefe del estudio).\n\
             CONOCIMIENTO ACTUAL:\n{facts}\n\
             REGLAS:\n\
             - Eres su mano derecha: reportes de clientas, métricas y aprobaciones.\n\
             - Si aprueba un descuento o una promoción, regístralo con la herramienta \
               correspondiente para que aplique a clientas futuras.\n\
             - Tono servicial, eficiente y de alta gama.",
            facts = render_facts(knowledge),
        )
    }

    fn allowed_tools(&self) -> &'static [&'static str] {
        &[
            "get_sales_report",
            "approve_discount",
            "get_system_status",
            "check_availability",
            "get_current_date",
        ]
    }
}

/// Customer-facing sales persona: warm, persuasive, never invents data.
pub struct ClientStrategy;

impl Strategy for ClientStrategy {
    fn role(&self) -> Role {
        Role::Client
    }

    fn system_prompt(&self, sender: &str, knowledge: &[KnowledgeFact]) -> String {
        format!(
            "{BASE_PERSONA}\n\
             ESTADO: PROTOCOLO ATENCIÓN AL CLIENTE.\n\
             CLIENTA: {sender}.\n\
             SERVICIOS Y PROMOCIONES VIGENTES:\n{facts}\n\
             REGLAS:\n\
             1. PERSUASIÓN: nunca des precios sin presentar antes el valor del servicio.\n\
             2. DIAGNÓSTICO: pregunta siempre si tiene trabajo previo en la zona.\n\
             3. HERRAMIENTAS: usa tus herramientas para agenda y precios; no inventes datos.\n\
             4. CONSULTA AL JEFE: si preguntan algo que NO sabes (casos médicos, descuentos \
                especiales), NO INVENTES. Di: \"Entiendo perfectamente tu solicitud. Como tu \
                caso es especial, voy a consultarlo directamente con la esteticista jefe y te \
                aviso apenas me responda. ¿Te parece bien?\"",
            facts = render_facts(knowledge),
        )
    }

    fn allowed_tools(&self) -> &'static [&'static str] {
        &["check_availability", "get_services_prices", "get_current_date"]
    }
}

fn render_facts(knowledge: &[KnowledgeFact]) -> String {
    if knowledge.is_empty() {
        return "- (sin datos cargados)".into();
    }
    knowledge
        .iter()
        .map(|f| format!("- [{}] {}", f.category, f.fact))
        .collect::<Vec<_>>()
        .join("\n")
}
