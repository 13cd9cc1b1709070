//! Carga y gestión de configuración de la aplicación (LLM + servicio de consultas).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::field_map::FieldMap;

#[derive(Clone, Debug, PartialEq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub frontend_dir: String,
    pub open_browser: bool,

    pub llm_provider: LlmProvider,
    pub llm_chat_model: String,
    pub llm_timeout: Duration,

    pub query_service_url: String,
    pub query_timeout: Duration,
    pub field_map: FieldMap,

    /// Inactividad tras la que se descarta una sesión abandonada.
    pub session_idle_ttl: Duration,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    ///
    /// La credencial del proveedor nunca vive en el código: sólo se comprueba
    /// que el entorno la aporte para que el cliente de Rig no falle más tarde.
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());
        let frontend_dir = env::var("FRONTEND_DIR").unwrap_or_else(|_| "frontend".to_string());
        let open_browser = parse_bool(env::var("OPEN_BROWSER").ok().as_deref(), true)?;

        let llm_provider_str =
            env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;

        if llm_provider == LlmProvider::OpenAI && env::var("OPENAI_API_KEY").is_err() {
            return Err(anyhow!("Falta OPENAI_API_KEY en el entorno"));
        }

        let llm_chat_model =
            env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let llm_timeout = parse_secs("LLM_TIMEOUT_SECS", env::var("LLM_TIMEOUT_SECS").ok(), 60)?;

        let query_service_url = normalize_base_url(
            &env::var("QUERY_SERVICE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string()),
        )?;
        let query_timeout =
            parse_secs("QUERY_TIMEOUT_SECS", env::var("QUERY_TIMEOUT_SECS").ok(), 30)?;

        let field_map = match env::var("FIELD_MAPPINGS") {
            Ok(raw) => FieldMap::parse(&raw)?,
            Err(_) => FieldMap::default(),
        };

        let session_idle_ttl = parse_secs(
            "SESSION_IDLE_TTL_SECS",
            env::var("SESSION_IDLE_TTL_SECS").ok(),
            1800,
        )?;

        Ok(Self {
            server_addr,
            frontend_dir,
            open_browser,
            llm_provider,
            llm_chat_model,
            llm_timeout,
            query_service_url,
            query_timeout,
            field_map,
            session_idle_ttl,
        })
    }
}

fn parse_secs(name: &str, raw: Option<String>, default: u64) -> Result<Duration> {
    let secs = match raw {
        None => default,
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow!("{name} debe ser un número entero de segundos: '{value}'"))?,
    };
    if secs == 0 {
        return Err(anyhow!("{name} debe ser mayor que cero"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(raw: Option<&str>, default: bool) -> Result<bool> {
    match raw.map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(anyhow!("Valor booleano no válido: '{v}'")),
    }
}

/// Valida la URL base del servicio de consultas y le quita la barra final.
fn normalize_base_url(raw: &str) -> Result<String> {
    let url = url::Url::parse(raw)
        .map_err(|e| anyhow!("QUERY_SERVICE_URL no es una URL válida ('{raw}'): {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("QUERY_SERVICE_URL debe usar http o https: '{raw}'"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
