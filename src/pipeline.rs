//! Single-request generation: validate, resolve the voice, load the model,
//! chunk the text and concatenate the chunk audio.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::chunker::Chunker;
use crate::error::{Result, StudioError};
use crate::languages;
use crate::models::{GenerationParams, ModelKind, ModelManager};
use crate::voices::{strip_gender_glyph, DefaultSamples, VoiceLibrary};
use crate::{SynthesisEngine, SynthesisResult};

/// A progress report: percentage complete and a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub message: String,
}

impl Progress {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent,
            message: message.into(),
        }
    }
}

/// One text-to-speech request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    /// Display name of the voice to clone; `None` uses the model's default.
    pub voice: Option<String>,
    /// Reference clip outside the library; takes precedence over `voice`.
    pub voice_file: Option<PathBuf>,
    pub params: GenerationParams,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            text: text.into(),
            voice: None,
            voice_file: None,
            params,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_voice_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.voice_file = Some(path.into());
        self
    }

    /// The requested voice, treating empty and `"None"` as no voice.
    pub fn voice_name(&self) -> Option<&str> {
        voice_choice(self.voice.as_deref())
    }
}

fn voice_choice(voice: Option<&str>) -> Option<&str> {
    voice
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "None")
}

/// Rough wall-clock estimate for generating `chars` characters.
pub fn estimate_generation_time(chars: usize, kind: ModelKind) -> f64 {
    let secs = chars as f64 / 50.0 * 2.0 + 1.0;
    match kind {
        ModelKind::Turbo => secs * 0.3,
        _ => secs,
    }
}

/// Render seconds as `"12.3 seconds"` or `"2 minutes 5.0 seconds"`.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        return format!("{secs:.1} seconds");
    }
    let minutes = (secs / 60.0).floor() as u64;
    let rest = secs - minutes as f64 * 60.0;
    let plural = if minutes == 1 { "" } else { "s" };
    format!("{minutes} minute{plural} {rest:.1} seconds")
}

/// Check a request without touching the model.
pub fn validate(request: &SpeechRequest) -> Result<()> {
    if request.text.trim().is_empty() {
        return Err(StudioError::Validation(
            "Input text cannot be empty.".to_string(),
        ));
    }
    match &request.params {
        GenerationParams::Turbo(_)
            if request.voice_name().is_none() && request.voice_file.is_none() =>
        {
            Err(StudioError::Validation(
                "Please select a voice for Turbo TTS. A reference clip is required.".to_string(),
            ))
        }
        GenerationParams::Multilingual(p) if p.language.trim().is_empty() => {
            Err(StudioError::Validation(
                "Please select a language for multilingual TTS.".to_string(),
            ))
        }
        GenerationParams::Multilingual(p) if !languages::is_supported(&p.language) => {
            Err(StudioError::UnsupportedLanguage(p.language.clone()))
        }
        _ => Ok(()),
    }
}

/// Reference clip for a request, with the status line to report.
fn resolve_prompt(
    library: &VoiceLibrary,
    defaults: &DefaultSamples,
    request: &SpeechRequest,
) -> Result<(Option<PathBuf>, String)> {
    if let Some(path) = &request.voice_file {
        if !path.is_file() {
            return Err(StudioError::Validation(format!(
                "Voice file not found: {}",
                path.display()
            )));
        }
        return Ok((Some(path.clone()), "Loading voice from file...".to_string()));
    }
    let language = request.params.language();
    match request.voice_name() {
        Some(name) => {
            let path = library
                .resolve_with_defaults(name, language, defaults)?
                .ok_or_else(|| StudioError::VoiceNotFound(name.to_string()))?;
            Ok((Some(path), format!("Loading voice: {name}...")))
        }
        None => match &request.params {
            GenerationParams::Multilingual(p) => {
                let lang = languages::lookup(&p.language)
                    .ok_or_else(|| StudioError::UnsupportedLanguage(p.language.clone()))?;
                let path = if lang.has_default_voice() {
                    Some(defaults.fetch(lang.code)?)
                } else {
                    None
                };
                Ok((path, format!("Using default voice for {}...", lang.name)))
            }
            _ => Ok((
                None,
                "No voice selected - using default voice...".to_string(),
            )),
        },
    }
}

/// Generate speech for one request, reporting progress through `on_progress`.
///
/// Progress runs 10 (voice), 20 (model), 30 (seed, when seeded), 40 (start),
/// one step per chunk up to 90, then 100 on completion.
pub fn generate_speech<E, F>(
    manager: &mut ModelManager<E>,
    library: &VoiceLibrary,
    defaults: &DefaultSamples,
    chunker: &Chunker,
    request: &SpeechRequest,
    mut on_progress: F,
) -> Result<SynthesisResult>
where
    E: SynthesisEngine,
    F: FnMut(Progress),
{
    let start = Instant::now();
    validate(request)?;

    let kind = request.params.kind();
    let text_len = request.text.chars().count();
    if text_len > 250 {
        log::info!("Text length: {text_len} chars - using smart chunking");
    }

    let (prompt, voice_status) = resolve_prompt(library, defaults, request)?;
    on_progress(Progress::new(10, voice_status));

    on_progress(Progress::new(
        20,
        format!("Loading {} model...", kind.display_name()),
    ));
    manager.ensure(kind)?;

    if let Some(seed) = request.params.seed() {
        on_progress(Progress::new(30, format!("Seed set to {seed}")));
    }

    let chunks = chunker.split(&request.text);
    let total = chunks.len();
    let language = languages::display_name(request.params.language());
    let estimate = estimate_generation_time(text_len, kind);
    on_progress(Progress::new(
        40,
        format!(
            "Generating speech ({language})...\nChunks: {total}\nEstimated time: {}",
            format_duration(estimate)
        ),
    ));

    let mut parts = Vec::with_capacity(total);
    for (i, chunk) in chunks.iter().enumerate() {
        let percent = 40 + (i * 50 / total) as u8;
        on_progress(Progress::new(
            percent,
            format!("Generating chunk {}/{total}...", i + 1),
        ));
        log::debug!("Chunk {}/{total}: {chunk}", i + 1);
        parts.push(manager.synthesize(chunk, prompt.as_deref(), &request.params)?);
    }

    on_progress(Progress::new(90, "Finalizing audio..."));
    let audio = SynthesisResult::concat(parts)?;

    let elapsed = start.elapsed().as_secs_f64();
    log::info!(
        "Generated {:.1}s of audio in {} ({total} chunks)",
        audio.duration_secs(),
        format_duration(elapsed)
    );
    on_progress(Progress::new(
        100,
        format!(
            "Generation complete!\nTime taken: {}\nText length: {text_len} chars\nChunks: {total}",
            format_duration(elapsed)
        ),
    ));
    Ok(audio)
}

/// Re-voice `source` with the voice `target` names.
///
/// `target` is resolved in any language; `None` keeps the model's default
/// target voice.
pub fn convert_voice<E, F>(
    manager: &mut ModelManager<E>,
    library: &VoiceLibrary,
    source: &Path,
    target: Option<&str>,
    on_progress: F,
) -> Result<SynthesisResult>
where
    E: SynthesisEngine,
    F: FnMut(Progress),
{
    let target = match voice_choice(target).map(strip_gender_glyph) {
        Some(name) if !name.trim().is_empty() && name.trim() != "None" => {
            let path = library
                .find(&name)
                .and_then(|key| library.get(key))
                .ok_or_else(|| StudioError::VoiceNotFound(name.clone()))?;
            Some((path.to_path_buf(), format!("Using target voice: {name}...")))
        }
        _ => None,
    };
    run_conversion(manager, source, target, on_progress)
}

/// Re-voice `source` with an explicit reference clip.
pub fn convert_with_clip<E, F>(
    manager: &mut ModelManager<E>,
    source: &Path,
    target: Option<&Path>,
    on_progress: F,
) -> Result<SynthesisResult>
where
    E: SynthesisEngine,
    F: FnMut(Progress),
{
    let target = match target {
        Some(path) if !path.is_file() => {
            return Err(StudioError::Validation(format!(
                "Target voice file not found: {}",
                path.display()
            )));
        }
        Some(path) => Some((path.to_path_buf(), "Using target voice file...".to_string())),
        None => None,
    };
    run_conversion(manager, source, target, on_progress)
}

fn run_conversion<E, F>(
    manager: &mut ModelManager<E>,
    source: &Path,
    target: Option<(PathBuf, String)>,
    mut on_progress: F,
) -> Result<SynthesisResult>
where
    E: SynthesisEngine,
    F: FnMut(Progress),
{
    let start = Instant::now();
    if !source.is_file() {
        return Err(StudioError::Validation(
            "No input audio provided.".to_string(),
        ));
    }
    on_progress(Progress::new(20, "Loading input audio..."));

    let target_path = match target {
        Some((path, status)) => {
            on_progress(Progress::new(40, status));
            Some(path)
        }
        None => {
            on_progress(Progress::new(
                40,
                "No target voice selected - using default...",
            ));
            None
        }
    };

    on_progress(Progress::new(60, "Loading Voice Conversion model..."));
    manager.ensure(ModelKind::Conversion)?;

    on_progress(Progress::new(70, "Converting voice..."));
    let audio = manager.convert(source, target_path.as_deref())?;

    on_progress(Progress::new(95, "Finalizing audio..."));
    on_progress(Progress::new(
        100,
        format!(
            "Conversion complete!\nTime taken: {}",
            format_duration(start.elapsed().as_secs_f64())
        ),
    ));
    Ok(audio)
}
