//! Service info, voice listing, uploads and the language table.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::languages;
use crate::storage::{self, StoredVoice};
use crate::voices::VoiceSample;

use super::error::ApiError;
use super::form::FormFields;
use super::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Chatterbox Studio API",
        "version": VERSION,
        "description": "Voice cloning, text-to-speech, voice conversion and multilingual TTS",
        "endpoints": {
            "health": "/health",
            "default_voices": "/default-voices",
            "list_voices": "/voices",
            "upload_voice": "/upload-voice",
            "delete_voice": "/voices/{voice_id}",
            "generate_tts": "/generate/tts",
            "generate_multilingual": "/generate/multilingual",
            "generate_turbo": "/generate/turbo",
            "convert_voice": "/convert-voice",
            "supported_languages": "/languages",
        },
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    // A held lock means a generation is running; don't wait for it.
    let (model, busy) = match state.manager.try_lock() {
        Ok(manager) => (manager.resident().map(|k| k.as_str()), false),
        Err(_) => (None, true),
    };
    Json(json!({
        "ok": true,
        "supabase_connected": state.storage.is_some(),
        "engine_url": state.config.engine_url,
        "model": model,
        "busy": busy,
        "version": VERSION,
    }))
}

/// A voice from the local library.
#[derive(Debug, Serialize)]
pub struct LibraryVoice {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub gender: String,
    pub language: String,
    pub is_default: bool,
}

impl From<VoiceSample> for LibraryVoice {
    fn from(sample: VoiceSample) -> Self {
        Self {
            display_name: sample.display_name(),
            gender: sample
                .gender
                .map_or("unknown", |g| g.as_str())
                .to_string(),
            id: sample.name,
            name: sample.base_name,
            language: sample.language,
            is_default: true,
        }
    }
}

fn library_voices(state: &AppState) -> Result<Vec<LibraryVoice>, ApiError> {
    let library = state
        .library
        .read()
        .map_err(|_| ApiError::internal("Failed to load default voices: library lock poisoned"))?;
    Ok(library.samples().into_iter().map(LibraryVoice::from).collect())
}

pub async fn default_voices(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let voices = library_voices(&state)?;
    Ok(Json(json!({
        "count": voices.len(),
        "message": format!("Found {} default voices", voices.len()),
        "voices": voices,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VoicesQuery {
    #[serde(default = "default_true")]
    include_defaults: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum VoiceEntry {
    Library(LibraryVoice),
    Uploaded(StoredVoice),
}

pub async fn list_voices(
    State(state): State<AppState>,
    Query(query): Query<VoicesQuery>,
) -> Json<Value> {
    let mut voices = Vec::new();
    if query.include_defaults {
        match library_voices(&state) {
            Ok(local) => voices.extend(local.into_iter().map(VoiceEntry::Library)),
            Err(e) => log::warn!("{}", e.detail()),
        }
    }
    let default_count = voices.len();

    if let Some(store) = state.storage.clone() {
        let listed = tokio::task::spawn_blocking(move || storage::stored_voices(store.as_ref()))
            .await;
        match listed {
            Ok(Ok(uploaded)) => voices.extend(uploaded.into_iter().map(VoiceEntry::Uploaded)),
            Ok(Err(e)) => log::warn!("Listing uploaded voices failed: {e}"),
            Err(e) => log::warn!("Listing uploaded voices failed: {e}"),
        }
    }

    Json(json!({
        "count": voices.len(),
        "default_count": default_count,
        "uploaded_count": voices.len() - default_count,
        "voices": voices,
    }))
}

pub async fn upload_voice(
    State(state): State<AppState>,
    mut form: FormFields,
) -> Result<Json<Value>, ApiError> {
    let store = state.storage()?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::unprocessable("Field required: file"))?;
    let content_type = file.content_type.clone().unwrap_or_default();
    if !content_type.starts_with("audio/") {
        return Err(ApiError::bad_request("Only audio files allowed"));
    }

    let gender = form.optional("gender").unwrap_or("male").to_string();
    let language = form.optional("language").unwrap_or("en").to_string();
    let original = file.filename.clone().unwrap_or_default();
    let voice_id = uuid::Uuid::new_v4().to_string();
    let filename = storage::upload_name(&voice_id, &gender, &language, &original);

    let url = {
        let filename = filename.clone();
        tokio::task::spawn_blocking(move || {
            store.upload(&filename, &file.bytes, &content_type)?;
            Ok::<_, crate::StudioError>(store.public_url(&filename))
        })
        .await
        .map_err(|e| ApiError::internal(format!("Upload failed: {e}")))?
        .map_err(|e| ApiError::internal(format!("Upload failed: {e}")))?
    };

    Ok(Json(json!({
        "id": voice_id,
        "name": form.optional("name").unwrap_or(&original),
        "url": url,
        "gender": gender,
        "language": language,
        "filename": filename,
        "is_default": false,
    })))
}

pub async fn delete_voice(
    State(state): State<AppState>,
    Path(voice_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.storage()?;
    let deleted = tokio::task::spawn_blocking(move || {
        let matching: Vec<String> = store
            .list()?
            .into_iter()
            .filter(|name| name.starts_with(&voice_id))
            .collect();
        if !matching.is_empty() {
            store.remove(&matching)?;
        }
        Ok::<_, crate::StudioError>(matching)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Delete failed: {e}")))?
    .map_err(|e| ApiError::internal(format!("Delete failed: {e}")))?;

    if deleted.is_empty() {
        return Err(ApiError::not_found("Voice not found"));
    }
    log::info!("Deleted {} uploaded file(s)", deleted.len());
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {} file(s)", deleted.len()),
        "deleted_files": deleted,
    })))
}

pub async fn languages() -> Json<Value> {
    let languages: Vec<Value> = languages::all()
        .iter()
        .map(|lang| {
            json!({
                "code": lang.code,
                "name": lang.name,
                "has_default_voice": lang.has_default_voice(),
            })
        })
        .collect();
    Json(json!({
        "count": languages.len(),
        "message": format!("Supports {} languages", languages.len()),
        "languages": languages,
    }))
}
