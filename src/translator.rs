//! Traductor de consultas: frase libre → LLM → filtro JSON → servicio de consultas.
//!
//! Flujo de `translate_and_query`:
//!   1. Ocupa la sesión y registra el turno del usuario.
//!   2. Pide el filtro al LLM con el prompt de la vista (y el historial si la
//!      vista lo usa).
//!   3. Registra el acuse fijo del asistente.
//!   4. Interpreta la respuesta como JSON y aplica la tabla de renombrado.
//!   5. Envía `{query, collectionName}` al servicio y guarda la salida formateada.
//!
//! Cada llamada externa tiene un tiempo máximo y puede abortarse desde la sesión.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{Stage, TranslateError};
use crate::field_map::FieldMap;
use crate::llm::{CompletionBackend, CompletionRequest};
use crate::models::{ChatMessage, QueryRequest, StructuredFilter};
use crate::persona::PersonaProfile;
use crate::query_client::QueryServiceClient;
use crate::session::Session;

/// Resultado de una consulta completada.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Filtro enviado al servicio, ya renombrado.
    pub filter: StructuredFilter,
    pub results: Vec<Value>,
    /// `results` formateado con sangría de dos espacios; es lo que muestra la vista.
    pub output: String,
    /// Texto crudo del LLM. No se guarda en el historial.
    pub model_reply: String,
}

pub struct QueryTranslator {
    completion: Arc<dyn CompletionBackend>,
    query_client: QueryServiceClient,
    field_map: FieldMap,
    llm_timeout: Duration,
    query_timeout: Duration,
}

impl QueryTranslator {
    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        query_client: QueryServiceClient,
        field_map: FieldMap,
        llm_timeout: Duration,
        query_timeout: Duration,
    ) -> Self {
        Self {
            completion,
            query_client,
            field_map,
            llm_timeout,
            query_timeout,
        }
    }

    pub fn from_config(cfg: &AppConfig, completion: Arc<dyn CompletionBackend>) -> Self {
        Self::new(
            completion,
            QueryServiceClient::new(&cfg.query_service_url),
            cfg.field_map.clone(),
            cfg.llm_timeout,
            cfg.query_timeout,
        )
    }

    /// Traduce `text` en un filtro para la colección de la vista y lo ejecuta.
    ///
    /// La entrada vacía y los envíos con la sesión ocupada se rechazan sin tocar
    /// el historial. Cualquier otro fallo deja su mensaje como salida de la sesión.
    pub async fn translate_and_query(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<QueryOutcome, TranslateError> {
        if text.trim().is_empty() {
            return Err(TranslateError::EmptyInput);
        }
        let in_flight = session.try_begin().ok_or(TranslateError::Busy)?;

        let profile = session.persona.profile();
        let history = if profile.include_history {
            session.messages()
        } else {
            Vec::new()
        };
        session.push_message(ChatMessage::user(text));

        let result = self
            .run(session, &profile, history, text, in_flight.token())
            .await;

        if let Err(err) = &result {
            error!("Error procesando la consulta de la sesión {}: {}", session.id, err);
            if let Some(output) = err.user_output() {
                session.set_output(output);
            }
        }
        result
    }

    async fn run(
        &self,
        session: &Session,
        profile: &PersonaProfile,
        history: Vec<ChatMessage>,
        text: &str,
        token: &CancellationToken,
    ) -> Result<QueryOutcome, TranslateError> {
        let request = CompletionRequest {
            system_prompt: profile.system_prompt.to_string(),
            history,
            prompt: text.to_string(),
            temperature: profile.temperature,
        };

        let reply = bounded(
            Stage::Completion,
            self.llm_timeout,
            token,
            self.completion.complete(request),
        )
        .await?
        .map_err(|e| TranslateError::Completion(format!("{e:#}")))?
        .unwrap_or_else(|| profile.fallback_reply.to_string());
        debug!("Respuesta del LLM: {}", reply);

        session.push_message(ChatMessage::assistant(profile.acknowledgement));

        let mut filter = parse_filter(&reply).map_err(|e| {
            warn!("La respuesta del LLM no es JSON válido. Error: {}. Respuesta: '{}'", e, reply);
            TranslateError::Parse(e)
        })?;
        let renamed = self.field_map.apply(&mut filter);
        info!("Filtro transformado ({} campos renombrados): {}", renamed, filter);

        let request = QueryRequest {
            query: filter,
            collection_name: profile.collection.to_string(),
        };
        let results = bounded(
            Stage::Query,
            self.query_timeout,
            token,
            self.query_client.execute(&request),
        )
        .await??;

        let output = serde_json::to_string_pretty(&results).unwrap_or_default();
        session.set_output(output.clone());
        info!(
            "Consulta sobre '{}' completada: {} resultados",
            request.collection_name,
            results.len()
        );

        Ok(QueryOutcome {
            filter: request.query,
            results,
            output,
            model_reply: reply,
        })
    }
}

/// Espera `fut` como mucho `limit`, abortando si se cancela la sesión.
async fn bounded<T>(
    stage: Stage,
    limit: Duration,
    token: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, TranslateError> {
    tokio::select! {
        _ = token.cancelled() => Err(TranslateError::Cancelled),
        res = tokio::time::timeout(limit, fut) => res.map_err(|_| TranslateError::Timeout(stage)),
    }
}

/// Interpreta la respuesta del LLM como JSON, tolerando un bloque ```json.
fn parse_filter(reply: &str) -> Result<StructuredFilter, serde_json::Error> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(cleaned)
}
