//! Estado por vista abierta: historial de mensajes, indicador de ocupado,
//! última salida y la cancelación de la consulta en curso.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::models::ChatMessage;
use crate::persona::Persona;

/// Todo el estado mutable vive bajo un único cerrojo: el indicador de ocupado,
/// el token de cancelación y el historial cambian siempre juntos.
#[derive(Debug)]
struct SessionInner {
    busy: bool,
    messages: Vec<ChatMessage>,
    output: Option<String>,
    cancel: Option<CancellationToken>,
    last_used: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub persona: Persona,
    pub created_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
}

/// Vista serializable de una sesión.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub persona: Persona,
    pub collection: &'static str,
    pub busy: bool,
    pub messages: Vec<ChatMessage>,
    pub output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Marca la sesión como ocupada mientras vive. Al soltarse (en cualquier salida:
/// éxito, error, timeout o cancelación) libera el indicador.
#[derive(Debug)]
pub struct InFlight<'a> {
    session: &'a Session,
    token: CancellationToken,
}

impl InFlight<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.inner();
        inner.cancel = None;
        inner.busy = false;
    }
}

impl Session {
    pub fn new(persona: Persona) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            persona,
            created_at: now,
            inner: Mutex::new(SessionInner {
                busy: false,
                messages: Vec::new(),
                output: None,
                cancel: None,
                last_used: now,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Intenta ocupar la sesión. `None` si ya hay un envío en curso: el nuevo
    /// envío se descarta, no se encola. El token queda instalado en el mismo
    /// paso, así que un `cancel` posterior siempre lo alcanza.
    pub fn try_begin(&self) -> Option<InFlight<'_>> {
        let mut inner = self.inner();
        if inner.busy {
            return None;
        }
        let token = CancellationToken::new();
        inner.busy = true;
        inner.cancel = Some(token.clone());
        inner.last_used = Utc::now();
        Some(InFlight { session: self, token })
    }

    pub fn is_busy(&self) -> bool {
        self.inner().busy
    }

    pub fn touch(&self) {
        self.inner().last_used = Utc::now();
    }

    pub fn last_used(&self) -> DateTime<Utc> {
        self.inner().last_used
    }

    pub fn push_message(&self, message: ChatMessage) {
        self.inner().messages.push(message);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner().messages.clone()
    }

    pub fn set_output(&self, output: impl Into<String>) {
        self.inner().output = Some(output.into());
    }

    pub fn output(&self) -> Option<String> {
        self.inner().output.clone()
    }

    /// Empieza una conversación nueva. Se rechaza si hay un envío en curso.
    pub fn reset(&self) -> bool {
        let mut inner = self.inner();
        if inner.busy {
            return false;
        }
        inner.messages.clear();
        inner.output = None;
        true
    }

    /// Cancela el envío en curso, si lo hay.
    pub fn cancel(&self) -> bool {
        match self.inner().cancel.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Lleva inactiva al menos `ttl` en el instante `now`.
    fn is_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.last_used())
            .to_std()
            .map_or(false, |idle| idle >= ttl)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner();
        SessionSnapshot {
            id: self.id,
            persona: self.persona,
            collection: self.persona.profile().collection,
            busy: inner.busy,
            messages: inner.messages.clone(),
            output: inner.output.clone(),
            created_at: self.created_at,
            last_used: inner.last_used,
        }
    }
}

/// Sesiones abiertas, indexadas por id.
///
/// Una pestaña que se cierra sin avisar deja su sesión huérfana; el barrido
/// periódico (`spawn_idle_sweeper`) la descarta tras `SESSION_IDLE_TTL_SECS`.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Arc<Session>>>>,
}

impl SessionStore {
    fn map(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, persona: Persona) -> Arc<Session> {
        let session = Arc::new(Session::new(persona));
        self.map().insert(session.id, session.clone());
        info!("Sesión {} abierta para la vista {:?}", session.id, persona);
        session
    }

    /// Devuelve la sesión y la marca como usada.
    pub fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        let session = self.map().get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Cierra la sesión (el usuario abandona la vista) y aborta su envío en curso.
    pub fn close(&self, id: &Uuid) -> bool {
        let removed = self.map().remove(id);
        match removed {
            Some(session) => {
                session.cancel();
                info!("Sesión {} cerrada", id);
                true
            }
            None => false,
        }
    }

    /// Descarta las sesiones sin uso desde hace `ttl` y cancela su envío en curso.
    /// Devuelve cuántas se descartaron.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        self.evict_idle_at(Utc::now(), ttl)
    }

    fn evict_idle_at(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let evicted: Vec<Arc<Session>> = {
            let mut map = self.map();
            let idle: Vec<Uuid> = map
                .values()
                .filter(|session| session.is_idle(now, ttl))
                .map(|session| session.id)
                .collect();
            idle.iter().filter_map(|id| map.remove(id)).collect()
        };

        for session in &evicted {
            session.cancel();
            info!("Sesión {} descartada por inactividad", session.id);
        }
        evicted.len()
    }

    /// Lanza el barrido periódico de sesiones inactivas.
    pub fn spawn_idle_sweeper(&self, ttl: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = (ttl / 4).max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                store.evict_idle(ttl);
            }
        })
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }
}
