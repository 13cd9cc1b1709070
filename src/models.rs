//! Modelos de dominio: mensajes de la conversación, peticiones al servicio de
//! consultas y las fichas de ejemplo que muestra cada vista.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filtro estructurado producido por el LLM. No se valida contra ningún esquema:
/// lo que acepte el servicio de consultas es válido.
pub type StructuredFilter = Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

/// Un turno de la conversación de una sesión.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Cuerpo de `POST /execute-query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: StructuredFilter,
    #[serde(rename = "collectionName")]
    pub collection_name: String,
}

/// Respuesta del servicio de consultas. En éxito trae `results`, en error `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryServiceResponse {
    #[serde(default)]
    pub results: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<String>,
}

// --- Fichas de ejemplo (no se derivan de los resultados de la consulta) ---

#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub address_line_1: String,
    pub address_line_2: String,
    pub city: String,
    pub district: String,
    pub state: String,
    pub pincode: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobCard {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub details: Address,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCard {
    pub name: String,
    pub location: String,
    pub role: String,
    pub employment_type: String,
    pub ranking: f32,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyCard {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub industry: String,
    pub location: String,
    pub description: String,
    pub website: String,
    pub employees: String,
    pub logo: String,
}

/// Fichas de una vista concreta.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "cards", rename_all = "lowercase")]
pub enum DisplayCards {
    Jobs(Vec<JobCard>),
    Users(Vec<UserCard>),
    Companies(Vec<CompanyCard>),
}
