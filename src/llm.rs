//! Abstracción sobre Rig para pedir al LLM que traduzca una frase en un filtro.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::{AppConfig, LlmProvider};
use crate::models::{ChatMessage, Role};

/// Petición de completado: instrucción de sistema, turnos previos y el turno nuevo.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub prompt: String,
    pub temperature: Option<f64>,
}

/// Servicio de completado. Devuelve el texto de la primera respuesta, o `None`
/// si el proveedor no devolvió contenido.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>>;
}

/// Gestor de LLMs.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub chat_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Ok(Self {
            provider: cfg.llm_provider.clone(),
            chat_model: cfg.llm_chat_model.clone(),
        })
    }

    async fn complete_with_openai(&self, request: CompletionRequest) -> Result<Option<String>> {
        use rig::client::CompletionClient as _;
        use rig::completion::{Chat, Message};
        use rig::providers::openai;

        // La clave llega por OPENAI_API_KEY; AppConfig ya comprobó que existe.
        let client = openai::Client::from_env();

        let model_name = if self.chat_model.is_empty() {
            "gpt-3.5-turbo"
        } else {
            self.chat_model.as_str()
        };

        let mut builder = client.agent(model_name).preamble(&request.system_prompt);
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }
        let agent = builder.build();

        let history: Vec<Message> = request
            .history
            .iter()
            .map(|msg| match msg.role {
                Role::User => Message::user(msg.content.clone()),
                Role::Assistant => Message::assistant(msg.content.clone()),
            })
            .collect();

        debug!(
            "Pidiendo completado a {} con {} turnos previos",
            model_name,
            history.len()
        );
        let reply = agent.chat(request.prompt.as_str(), history).await?;

        Ok(Some(reply).filter(|text| !text.trim().is_empty()))
    }
}

#[async_trait]
impl CompletionBackend for LlmManager {
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_with_openai(request).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para chat",
                other
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_providers_fail_without_network() {
        let manager = LlmManager {
            provider: LlmProvider::Ollama,
            chat_model: String::new(),
        };
        let request = CompletionRequest {
            system_prompt: "sys".into(),
            history: Vec::new(),
            prompt: "hola".into(),
            temperature: Some(0.0),
        };
        let err = manager.complete(request).await.unwrap_err();
        assert!(err.to_string().contains("aún no implementado"));
    }
}
