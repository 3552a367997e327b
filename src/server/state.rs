//! Server state and configuration.

use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::config::{Settings, SettingsStore};
use crate::error::LabelError;
use crate::records::RecordSource;
use crate::render::{CaptionFont, LabelComposer};
use crate::session::Session;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Settings file, reloaded after every save
    pub settings_path: PathBuf,
    /// Address to listen on (e.g., "127.0.0.1:8080")
    pub listen_addr: String,
}

/// Application state shared across handlers.
///
/// One operator at a time: the session is global to the server.
pub struct AppState {
    pub config: ServerConfig,
    pub store: SettingsStore,
    pub settings: RwLock<Settings>,
    pub session: RwLock<Session>,
    /// Caption font for the configured `font_path`
    pub font: RwLock<CaptionFont>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let store = SettingsStore::new(&config.settings_path);
        let settings = store.load();
        let font = CaptionFont::load(settings.font_path.as_deref());
        Self {
            config,
            store,
            settings: RwLock::new(settings),
            session: RwLock::new(Session::new()),
            font: RwLock::new(font),
        }
    }

    /// The configured record source.
    pub async fn records(&self) -> Box<dyn RecordSource> {
        self.settings.read().await.record_source()
    }

    /// A composer for the configured label size and caption font.
    pub async fn composer(&self) -> Result<LabelComposer, LabelError> {
        let spec = self.settings.read().await.label_spec()?;
        let font = self.font.read().await.clone();
        Ok(LabelComposer::new(spec, font))
    }
}
