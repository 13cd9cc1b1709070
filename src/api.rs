use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    models::{ChatMessage, DisplayCards, StructuredFilter},
    persona::Persona,
    session::{Session, SessionSnapshot},
};

type ApiError = (StatusCode, Json<Value>);

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct CreateSessionPayload {
    persona: Persona,
}

#[derive(Deserialize)]
pub struct QueryPayload {
    text: String,
}

#[derive(Serialize)]
pub struct PersonaInfo {
    persona: Persona,
    collection: &'static str,
    include_history: bool,
}

/// La vista pinta `output` en lugar de los resultados.
#[derive(Serialize)]
pub struct QueryResponse {
    output: String,
    results: Vec<Value>,
    filter: StructuredFilter,
    model_reply: String,
    messages: Vec<ChatMessage>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/personas", get(list_personas_handler))
        .route("/api/personas/:persona/cards", get(persona_cards_handler))
        .route("/api/sessions", post(create_session_handler))
        .route(
            "/api/sessions/:id",
            get(get_session_handler).delete(close_session_handler),
        )
        .route("/api/sessions/:id/query", post(query_handler))
        .route("/api/sessions/:id/reset", post(reset_handler))
        .route("/api/sessions/:id/cancel", post(cancel_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

fn find_session(state: &AppState, id: &Uuid) -> Result<std::sync::Arc<Session>, ApiError> {
    state.sessions.get(id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("No existe la sesión {id}")})),
        )
    })
}

// --- Handlers ---

#[axum::debug_handler]
async fn list_personas_handler() -> Json<Vec<PersonaInfo>> {
    let personas = Persona::ALL
        .into_iter()
        .map(|persona| {
            let profile = persona.profile();
            PersonaInfo {
                persona,
                collection: profile.collection,
                include_history: profile.include_history,
            }
        })
        .collect();
    Json(personas)
}

#[axum::debug_handler]
async fn persona_cards_handler(Path(persona): Path<Persona>) -> Json<DisplayCards> {
    Json(persona.placeholder_cards())
}

#[axum::debug_handler]
async fn create_session_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    // Una vista desconocida es un error del cliente, no un cuerpo mal formado.
    let Json(payload) = payload.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("Petición de sesión no válida: {}", rejection.body_text())})),
        )
    })?;
    let session = state.sessions.create(payload.persona);
    Ok((StatusCode::CREATED, Json(session.snapshot())))
}

#[axum::debug_handler]
async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, &id)?;
    Ok(Json(session.snapshot()))
}

#[axum::debug_handler]
async fn close_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.close(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("No existe la sesión {id}")})),
        ))
    }
}

#[axum::debug_handler]
async fn query_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QueryPayload>,
) -> Result<Json<QueryResponse>, ApiError> {
    let session = find_session(&state, &id)?;

    match state
        .translator
        .translate_and_query(&session, &payload.text)
        .await
    {
        Ok(outcome) => Ok(Json(QueryResponse {
            output: outcome.output,
            results: outcome.results,
            filter: outcome.filter,
            model_reply: outcome.model_reply,
            messages: session.messages(),
        })),
        Err(e) => Err((
            e.status_code(),
            Json(json!({
                "error": e.to_string(),
                "output": session.output(),
                "messages": session.messages(),
            })),
        )),
    }
}

#[axum::debug_handler]
async fn reset_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, &id)?;
    if !session.reset() {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({"error": "Hay una consulta en curso; cancélala antes de empezar de nuevo."})),
        ));
    }
    Ok(Json(session.snapshot()))
}

#[axum::debug_handler]
async fn cancel_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let session = find_session(&state, &id)?;
    let cancelled = session.cancel();
    if cancelled {
        info!("Consulta de la sesión {} cancelada por el usuario", id);
    }
    Ok(Json(json!({ "cancelled": cancelled })))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len(),
        "chat_model": state.config.llm_chat_model,
        "query_service": state.config.query_service_url,
    }))
}

// --- Handler de Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .take()
    {
        let _ = sender.send(());
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use crate::config::{AppConfig, LlmProvider};
    use crate::field_map::FieldMap;
    use crate::llm::testing::ScriptedBackend;
    use crate::query_client::testing::{self as fake_service, FakeQueryService};
    use crate::session::SessionStore;
    use crate::translator::QueryTranslator;

    fn test_config(query_service_url: &str) -> AppConfig {
        AppConfig {
            server_addr: "127.0.0.1:0".to_string(),
            frontend_dir: "frontend".to_string(),
            open_browser: false,
            llm_provider: LlmProvider::OpenAI,
            llm_chat_model: "gpt-3.5-turbo".to_string(),
            llm_timeout: Duration::from_secs(5),
            query_service_url: query_service_url.to_string(),
            query_timeout: Duration::from_secs(5),
            field_map: FieldMap::default(),
            session_idle_ttl: Duration::from_secs(1800),
        }
    }

    /// Levanta la API con un LLM guionizado y devuelve su URL base.
    async fn spawn_api(
        backend: ScriptedBackend,
        service: &FakeQueryService,
    ) -> (String, oneshot::Receiver<()>) {
        let config = test_config(&service.base_url);
        let translator = QueryTranslator::from_config(&config, Arc::new(backend));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = AppState {
            config,
            translator: Arc::new(translator),
            sessions: SessionStore::default(),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), shutdown_rx)
    }

    async fn open_session(client: &reqwest::Client, base: &str, persona: &str) -> String {
        let res = client
            .post(format!("{base}/api/sessions"))
            .json(&json!({"persona": persona}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn query_round_trip_over_http() {
        let service = fake_service::spawn(
            StatusCode::OK,
            r#"{"results":[{"name":"Luna Hernandez","location":"Spain"}]}"#,
        )
        .await;
        let (base, _rx) = spawn_api(ScriptedBackend::replying(&[r#"{"location":"Spain"}"#]), &service).await;
        let client = reqwest::Client::new();
        let id = open_session(&client, &base, "user").await;

        let res = client
            .post(format!("{base}/api/sessions/{id}/query"))
            .json(&json!({"text": "find users in Spain"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["results"], json!([{"name": "Luna Hernandez", "location": "Spain"}]));
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);

        let snapshot: Value = client
            .get(format!("{base}/api/sessions/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["collection"], "users");
        assert_eq!(snapshot["busy"], false);
        assert_eq!(snapshot["output"], body["output"]);
    }

    #[tokio::test]
    async fn parse_failure_maps_to_unprocessable_entity() {
        let service = fake_service::spawn(StatusCode::OK, r#"{"results":[]}"#).await;
        let (base, _rx) = spawn_api(ScriptedBackend::replying(&["not json"]), &service).await;
        let client = reqwest::Client::new();
        let id = open_session(&client, &base, "company").await;

        let res = client
            .post(format!("{base}/api/sessions/{id}/query"))
            .json(&json!({"text": "solar companies"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["output"], crate::error::PARSE_ERROR_OUTPUT);
        assert_eq!(service.hits(), 0);
    }

    #[tokio::test]
    async fn reset_and_close_session() {
        let service = fake_service::spawn(StatusCode::OK, r#"{"results":[]}"#).await;
        let (base, _rx) = spawn_api(ScriptedBackend::replying(&["{}"]), &service).await;
        let client = reqwest::Client::new();
        let id = open_session(&client, &base, "job").await;

        client
            .post(format!("{base}/api/sessions/{id}/query"))
            .json(&json!({"text": "any job"}))
            .send()
            .await
            .unwrap();

        let reset: Value = client
            .post(format!("{base}/api/sessions/{id}/reset"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reset["messages"], json!([]));
        assert_eq!(reset["output"], Value::Null);

        let closed = client
            .delete(format!("{base}/api/sessions/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(closed.status(), reqwest::StatusCode::NO_CONTENT);

        let gone = client
            .get(format!("{base}/api/sessions/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(gone.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_without_in_flight_work_reports_false() {
        let service = fake_service::spawn(StatusCode::OK, r#"{"results":[]}"#).await;
        let (base, _rx) = spawn_api(ScriptedBackend::default(), &service).await;
        let client = reqwest::Client::new();
        let id = open_session(&client, &base, "user").await;

        let body: Value = client
            .post(format!("{base}/api/sessions/{id}/cancel"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"cancelled": false}));
    }

    #[tokio::test]
    async fn personas_and_cards_are_listed() {
        let service = fake_service::spawn(StatusCode::OK, r#"{"results":[]}"#).await;
        let (base, _rx) = spawn_api(ScriptedBackend::default(), &service).await;
        let client = reqwest::Client::new();

        let personas: Value = client
            .get(format!("{base}/api/personas"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(personas.as_array().unwrap().len(), 3);

        let cards: Value = client
            .get(format!("{base}/api/personas/company/cards"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cards["kind"], "companies");
        assert_eq!(cards["cards"][0]["name"], "Tech Innovators Inc.");

        let unknown = client
            .get(format!("{base}/api/personas/admin/cards"))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_persona_is_a_bad_request_with_json_error() {
        let service = fake_service::spawn(StatusCode::OK, r#"{"results":[]}"#).await;
        let (base, _rx) = spawn_api(ScriptedBackend::default(), &service).await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{base}/api/sessions"))
            .json(&json!({"persona": "admin"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("admin"));

        let missing = client
            .post(format!("{base}/api/sessions"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);

        let status: Value = client
            .get(format!("{base}/api/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["sessions"], 0);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let service = fake_service::spawn(StatusCode::OK, r#"{"results":[]}"#).await;
        let (base, _rx) = spawn_api(ScriptedBackend::default(), &service).await;
        let res = reqwest::Client::new()
            .post(format!("{base}/api/sessions/{}/query", Uuid::new_v4()))
            .json(&json!({"text": "hola"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn shutdown_fires_the_signal_once() {
        let service = fake_service::spawn(StatusCode::OK, r#"{"results":[]}"#).await;
        let (base, rx) = spawn_api(ScriptedBackend::default(), &service).await;
        let client = reqwest::Client::new();

        let res = client.post(format!("{base}/api/shutdown")).send().await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        assert!(rx.await.is_ok());

        let again = client.post(format!("{base}/api/shutdown")).send().await.unwrap();
        assert_eq!(again.status(), reqwest::StatusCode::OK);
    }
}
