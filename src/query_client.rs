//! Cliente HTTP del servicio que ejecuta los filtros contra MongoDB.

use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{TranslateError, DEFAULT_QUERY_ERROR};
use crate::models::{QueryRequest, QueryServiceResponse};

#[derive(Debug, Clone)]
pub struct QueryServiceClient {
    client: Client,
    endpoint: String,
}

impl QueryServiceClient {
    /// `base_url` sin barra final, p. ej. `http://localhost:5000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/execute-query", base_url.trim_end_matches('/')),
        }
    }

    /// Envía `{query, collectionName}` y devuelve la lista `results`.
    pub async fn execute(&self, request: &QueryRequest) -> Result<Vec<Value>, TranslateError> {
        info!(
            "Ejecutando consulta sobre '{}' en {}",
            request.collection_name, self.endpoint
        );

        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        // El cuerpo puede no ser JSON (p. ej. una página de error del proxy).
        let parsed: QueryServiceResponse = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            let message = parsed
                .error
                .unwrap_or_else(|| DEFAULT_QUERY_ERROR.to_string());
            warn!("El servicio de consultas respondió {}: {}", status, message);
            return Err(TranslateError::QueryService {
                status: status.as_u16(),
                message,
            });
        }

        parsed.results.ok_or_else(|| TranslateError::QueryService {
            status: status.as_u16(),
            message: DEFAULT_QUERY_ERROR.to_string(),
        })
    }
}
