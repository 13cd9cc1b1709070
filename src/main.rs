// Módulos de la aplicación
mod api;
mod app_state;
mod config;
mod error;
mod field_map;
mod llm;
mod models;
mod persona;
mod query_client;
mod session;
mod translator;

use crate::app_state::AppState;
use crate::session::SessionStore;
use crate::translator::QueryTranslator;
use axum::Router;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().map_err(|e| {
        error!("Error al cargar la configuración: {e:#}");
        e
    })?;
    info!(
        "Servicio de consultas en {} (timeouts: LLM {:?}, consulta {:?}; {} reglas de renombrado)",
        cfg.query_service_url,
        cfg.llm_timeout,
        cfg.query_timeout,
        cfg.field_map.rules().len()
    );

    // 3. Inicializar gestor de LLMs y el traductor
    let llm_manager = llm::LlmManager::from_config(&cfg)?;
    let translator = QueryTranslator::from_config(&cfg, Arc::new(llm_manager));

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 4. Crear estado compartido de la aplicación y el barrido de sesiones abandonadas
    let sessions = SessionStore::default();
    sessions.spawn_idle_sweeper(cfg.session_idle_ttl);

    let app_state = AppState {
        config: cfg.clone(),
        translator: Arc::new(translator),
        sessions,
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new(&cfg.frontend_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr).await?;
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if cfg.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
