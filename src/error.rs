//! Errores del traductor de consultas y su traducción a mensajes visibles.

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

/// Texto fijo que ve el usuario cuando la respuesta del LLM no es JSON.
pub const PARSE_ERROR_OUTPUT: &str = "Error parsing query. Please try again.";
/// Texto genérico para fallos del LLM o de red.
pub const GENERIC_ERROR_OUTPUT: &str = "Error executing query. Please try again.";
/// Mensaje por defecto si el servicio de consultas no explica su fallo.
pub const DEFAULT_QUERY_ERROR: &str = "Failed to execute query";

/// Llamada externa en la que se agotó el tiempo de espera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Completion,
    Query,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Completion => write!(f, "el servicio de completado"),
            Stage::Query => write!(f, "el servicio de consultas"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("la consulta está vacía")]
    EmptyInput,

    #[error("ya hay una consulta en curso para esta sesión")]
    Busy,

    #[error("fallo del servicio de completado: {0}")]
    Completion(String),

    #[error("tiempo de espera agotado esperando a {0}")]
    Timeout(Stage),

    #[error("consulta cancelada")]
    Cancelled,

    #[error("la respuesta del LLM no es JSON válido: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("el servicio de consultas respondió {status}: {message}")]
    QueryService { status: u16, message: String },

    #[error("error de red con el servicio de consultas: {0}")]
    Transport(#[from] reqwest::Error),
}

impl TranslateError {
    /// Texto que sustituye a los resultados en la vista.
    ///
    /// `None` para los rechazos que no deben tocar la salida (entrada vacía o
    /// sesión ocupada): el envío simplemente se ignora.
    pub fn user_output(&self) -> Option<String> {
        match self {
            Self::EmptyInput | Self::Busy => None,
            Self::Parse(_) => Some(PARSE_ERROR_OUTPUT.to_string()),
            Self::QueryService { message, .. } => Some(message.clone()),
            Self::Timeout(_) => Some("The request timed out. Please try again.".to_string()),
            Self::Cancelled => Some("Query cancelled.".to_string()),
            Self::Completion(_) | Self::Transport(_) => Some(GENERIC_ERROR_OUTPUT.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyInput => StatusCode::BAD_REQUEST,
            Self::Busy | Self::Cancelled => StatusCode::CONFLICT,
            Self::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Completion(_) | Self::QueryService { .. } | Self::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}
