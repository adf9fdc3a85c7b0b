//! Generation and conversion endpoints. Each returns a 16-bit WAV file.

use std::io::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::languages;
use crate::models::{GenerationParams, MultilingualParams, StandardParams};
use crate::pipeline::{self, Progress, SpeechRequest};
use crate::storage::download_to_temp;
use crate::SynthesisResult;

use super::error::ApiError;
use super::form::FormFields;
use super::AppState;

fn log_progress(progress: Progress) {
    log::debug!("[{:>3}%] {}", progress.percent, progress.message);
}

fn wav_response(audio: &SynthesisResult, filename: &str) -> Result<Response, ApiError> {
    let bytes = audio
        .to_wav_bytes()
        .map_err(|e| ApiError::internal(format!("Encoding failed: {e}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// The `text` field, which must be present and not blank.
fn text_field(form: &FormFields) -> Result<String, ApiError> {
    let text = form.required("text")?;
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("Text cannot be empty"));
    }
    Ok(text.to_string())
}

/// Run `request` through the shared model on a blocking thread.
///
/// A `voice_url` is only used when the request names no library voice; the
/// downloaded clip is deleted once generation finishes.
async fn synthesize(
    state: AppState,
    mut request: SpeechRequest,
    voice_url: Option<String>,
) -> Result<SynthesisResult, ApiError> {
    tokio::task::spawn_blocking(move || {
        let _download = match voice_url {
            Some(url) if request.voice_name().is_none() => {
                let file = download_to_temp(&url)
                    .map_err(|e| ApiError::from_studio("Generation failed", e))?;
                request = request.with_voice_file(file.path());
                Some(file)
            }
            _ => None,
        };

        let library = state
            .library
            .read()
            .map_err(|_| ApiError::internal("Generation failed: voice library lock poisoned"))?;
        let mut manager = state
            .manager
            .lock()
            .map_err(|_| ApiError::internal("Generation failed: model lock poisoned"))?;
        pipeline::generate_speech(
            &mut manager,
            &library,
            &state.defaults,
            &state.chunker,
            &request,
            log_progress,
        )
        .map_err(|e| ApiError::from_studio("Generation failed", e))
    })
    .await
    .map_err(|e| ApiError::internal(format!("Generation failed: {e}")))?
}

/// `POST /generate/tts`: English speech from the standard model.
pub async fn tts(State(state): State<AppState>, form: FormFields) -> Result<Response, ApiError> {
    let text = text_field(&form)?;
    let d = StandardParams::default();
    let params = StandardParams {
        exaggeration: form.parse_or("exaggeration", d.exaggeration)?,
        temperature: form.parse_or("temperature", d.temperature)?,
        cfg_weight: form.parse_or("cfg_weight", d.cfg_weight)?,
        min_p: form.parse_or("min_p", d.min_p)?,
        top_p: form.parse_or("top_p", d.top_p)?,
        repetition_penalty: form.parse_or("repetition_penalty", d.repetition_penalty)?,
        seed: form.parse_or("seed", d.seed)?,
    };

    let mut request = SpeechRequest::new(text, GenerationParams::Standard(params));
    if let Some(voice) = form.optional("voice_id") {
        request = request.with_voice(voice);
    }
    let voice_url = form.optional("voice_url").map(str::to_string);
    let audio = synthesize(state, request, voice_url).await?;
    wav_response(&audio, &format!("tts_{}.wav", Uuid::new_v4()))
}

/// `POST /generate/multilingual`: speech in any supported language. Without
/// a voice the language's built-in sample is used.
pub async fn multilingual(
    State(state): State<AppState>,
    form: FormFields,
) -> Result<Response, ApiError> {
    let text = text_field(&form)?;
    let language = form.required("language")?.trim().to_string();
    if language.is_empty() {
        return Err(ApiError::bad_request("Language code is required"));
    }
    if !languages::is_supported(&language) {
        return Err(ApiError::bad_request(format!(
            "Unsupported language: {language}"
        )));
    }

    let d = MultilingualParams::default();
    let params = MultilingualParams {
        language: language.clone(),
        exaggeration: form.parse_or("exaggeration", d.exaggeration)?,
        temperature: form.parse_or("temperature", d.temperature)?,
        cfg_weight: form.parse_or("cfg_weight", d.cfg_weight)?,
        seed: form.parse_or("seed", d.seed)?,
    };

    let mut request = SpeechRequest::new(text, GenerationParams::Multilingual(params));
    if let Some(voice) = form.optional("voice_id") {
        request = request.with_voice(voice);
    }
    let voice_url = form.optional("voice_url").map(str::to_string);
    let audio = synthesize(state, request, voice_url).await?;
    wav_response(
        &audio,
        &format!("multilingual_{language}_{}.wav", Uuid::new_v4()),
    )
}

/// `POST /generate/turbo`: fast English speech; a reference voice is required.
pub async fn turbo(State(state): State<AppState>, form: FormFields) -> Result<Response, ApiError> {
    let text = text_field(&form)?;
    let voice_id = form.optional("voice_id");
    let voice_url = form.optional("voice_url").map(str::to_string);
    if voice_id.is_none() && voice_url.is_none() {
        return Err(ApiError::bad_request(
            "Turbo model requires a voice reference (voice_id or voice_url)",
        ));
    }

    let mut request = SpeechRequest::new(text, GenerationParams::turbo());
    if let Some(voice) = voice_id {
        request = request.with_voice(voice);
    }
    let audio = synthesize(state, request, voice_url).await?;
    wav_response(&audio, &format!("turbo_{}.wav", Uuid::new_v4()))
}

/// `POST /convert-voice`: re-voice `input_audio` with a library voice
/// (`target_voice_id`) or a downloaded clip (`target_voice_url`).
pub async fn convert(
    State(state): State<AppState>,
    mut form: FormFields,
) -> Result<Response, ApiError> {
    let input = form
        .take_file("input_audio")
        .ok_or_else(|| ApiError::bad_request("Input audio file is required"))?;
    let target_id = form
        .optional("target_voice_id")
        .filter(|v| *v != "None")
        .map(str::to_string);
    let target_url = form.optional("target_voice_url").map(str::to_string);

    let audio = tokio::task::spawn_blocking(move || {
        let fail = |e: crate::StudioError| ApiError::from_studio("Voice conversion failed", e);
        let mut source = tempfile::Builder::new()
            .prefix("convert_")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| fail(e.into()))?;
        source
            .write_all(&input.bytes)
            .map_err(|e| fail(e.into()))?;

        let library = state.library.read().map_err(|_| {
            ApiError::internal("Voice conversion failed: voice library lock poisoned")
        })?;
        let mut manager = state
            .manager
            .lock()
            .map_err(|_| ApiError::internal("Voice conversion failed: model lock poisoned"))?;

        let converted = match (target_id, target_url) {
            (Some(name), _) => pipeline::convert_voice(
                &mut manager,
                &library,
                source.path(),
                Some(&name),
                log_progress,
            ),
            (None, Some(url)) => {
                let target = download_to_temp(&url).map_err(fail)?;
                pipeline::convert_with_clip(
                    &mut manager,
                    source.path(),
                    Some(target.path()),
                    log_progress,
                )
            }
            (None, None) => {
                pipeline::convert_with_clip(&mut manager, source.path(), None, log_progress)
            }
        };
        converted.map_err(fail)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Voice conversion failed: {e}")))??;

    wav_response(&audio, &format!("converted_{}.wav", Uuid::new_v4()))
}
