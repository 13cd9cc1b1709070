use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{config::AppConfig, session::SessionStore, translator::QueryTranslator};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub translator: Arc<QueryTranslator>,
    pub sessions: SessionStore,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}
