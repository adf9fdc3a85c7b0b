//! REST API over the voice library, the generation pipeline and uploaded
//! voice storage.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/` | service info and endpoint map |
//! | GET | `/health` | liveness, storage and resident model |
//! | GET | `/default-voices` | voices in the local library |
//! | GET | `/voices` | local and uploaded voices |
//! | POST | `/upload-voice` | store a clip in the bucket |
//! | DELETE | `/voices/{voice_id}` | remove uploaded clips |
//! | GET | `/languages` | multilingual language table |
//! | POST | `/generate/tts` | English TTS |
//! | POST | `/generate/multilingual` | TTS in any supported language |
//! | POST | `/generate/turbo` | fast TTS, reference voice required |
//! | POST | `/convert-voice` | voice conversion |
//!
//! Errors are JSON objects with a single `detail` field. Generation runs on
//! a blocking thread and requests share one [`ModelManager`], so at most one
//! generation runs at a time.

mod error;
mod form;
mod generate;
mod routes;

use std::sync::{Arc, Mutex, RwLock};

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::chunker::Chunker;
use crate::config::Config;
use crate::models::ModelManager;
use crate::storage::{SupabaseStorage, VoiceStore, NOT_CONFIGURED};
use crate::voices::{DefaultSamples, VoiceLibrary};
use crate::SynthesisEngine;

pub use error::ApiError;
pub use form::{FormFields, UploadedFile};

/// Engine type held by the server.
pub type SharedEngine = Box<dyn SynthesisEngine + Send>;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Mutex<ModelManager<SharedEngine>>>,
    pub library: Arc<RwLock<VoiceLibrary>>,
    pub defaults: Arc<DefaultSamples>,
    pub storage: Option<Arc<dyn VoiceStore>>,
    pub chunker: Chunker,
    pub config: Arc<Config>,
}

impl AppState {
    /// State for `config`; storage is enabled when Supabase is configured.
    pub fn new(engine: SharedEngine, library: VoiceLibrary, config: Config) -> Self {
        let storage = config
            .supabase
            .clone()
            .map(|s| Arc::new(SupabaseStorage::new(s)) as Arc<dyn VoiceStore>);
        Self {
            manager: Arc::new(Mutex::new(ModelManager::new(engine))),
            library: Arc::new(RwLock::new(library)),
            defaults: Arc::new(DefaultSamples::new(&config.cache_dir)),
            storage,
            chunker: Chunker::new(config.max_words),
            config: Arc::new(config),
        }
    }

    /// Replace the uploaded-voice store.
    pub fn with_storage(mut self, storage: Arc<dyn VoiceStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    fn storage(&self) -> Result<Arc<dyn VoiceStore>, ApiError> {
        self.storage
            .clone()
            .ok_or_else(|| ApiError::internal(NOT_CONFIGURED))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/default-voices", get(routes::default_voices))
        .route("/voices", get(routes::list_voices))
        .route("/voices/{voice_id}", delete(routes::delete_voice))
        .route("/upload-voice", post(routes::upload_voice))
        .route("/languages", get(routes::languages))
        .route("/generate/tts", post(generate::tts))
        .route("/generate/multilingual", post(generate::multilingual))
        .route("/generate/turbo", post(generate::turbo))
        .route("/convert-voice", post(generate::convert))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `addr` until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
