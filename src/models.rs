use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::{SynthesisEngine, SynthesisResult};

/// The Chatterbox model family. Exactly one of these is resident at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// English TTS with full sampling controls.
    Standard,
    /// Fast English TTS; always needs a reference clip.
    Turbo,
    /// 23-language TTS.
    Multilingual,
    /// Speech-to-speech voice conversion.
    Conversion,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Standard,
        ModelKind::Turbo,
        ModelKind::Multilingual,
        ModelKind::Conversion,
    ];

    /// Short identifier used on the wire and in file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Standard => "tts",
            ModelKind::Turbo => "turbo",
            ModelKind::Multilingual => "multilingual",
            ModelKind::Conversion => "vc",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Standard => "TTS",
            ModelKind::Turbo => "Turbo TTS",
            ModelKind::Multilingual => "Multilingual TTS",
            ModelKind::Conversion => "Voice Conversion",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tts" | "standard" => Ok(ModelKind::Standard),
            "turbo" => Ok(ModelKind::Turbo),
            "mtl" | "multilingual" => Ok(ModelKind::Multilingual),
            "vc" | "conversion" => Ok(ModelKind::Conversion),
            other => Err(StudioError::Validation(format!("Unknown model '{other}'"))),
        }
    }
}

/// Sampling controls for the standard English model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardParams {
    /// Emotion intensity. Range: 0.25–2.0, default 0.5.
    pub exaggeration: f32,
    /// Sampling temperature. Range: 0.05–5.0, default 0.8.
    pub temperature: f32,
    /// Classifier-free guidance weight / pace. Range: 0.0–1.0, default 0.5.
    pub cfg_weight: f32,
    pub min_p: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    /// Random seed; `0` leaves generation unseeded.
    pub seed: u64,
}

impl Default for StandardParams {
    fn default() -> Self {
        Self {
            exaggeration: 0.5,
            temperature: 0.8,
            cfg_weight: 0.5,
            min_p: 0.05,
            top_p: 1.0,
            repetition_penalty: 1.2,
            seed: 0,
        }
    }
}

/// The turbo model takes no tuning parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurboParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultilingualParams {
    /// ISO 639-1 language code (e.g. `"fr"`).
    pub language: String,
    pub exaggeration: f32,
    pub temperature: f32,
    pub cfg_weight: f32,
    pub seed: u64,
}

impl Default for MultilingualParams {
    fn default() -> Self {
        Self {
            language: crate::languages::ENGLISH.to_string(),
            exaggeration: 0.5,
            temperature: 0.8,
            cfg_weight: 0.5,
            seed: 0,
        }
    }
}

impl MultilingualParams {
    pub fn for_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }
}

/// Parameters for one generation request; the variant selects the model.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationParams {
    Standard(StandardParams),
    Turbo(TurboParams),
    Multilingual(MultilingualParams),
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams::Standard(StandardParams::default())
    }
}

impl GenerationParams {
    pub fn standard() -> Self {
        GenerationParams::Standard(StandardParams::default())
    }

    pub fn turbo() -> Self {
        GenerationParams::Turbo(TurboParams::default())
    }

    pub fn multilingual(language: impl Into<String>) -> Self {
        GenerationParams::Multilingual(MultilingualParams::for_language(language))
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            GenerationParams::Standard(_) => ModelKind::Standard,
            GenerationParams::Turbo(_) => ModelKind::Turbo,
            GenerationParams::Multilingual(_) => ModelKind::Multilingual,
        }
    }

    /// Requested seed, if any. A seed of `0` means unseeded.
    pub fn seed(&self) -> Option<u64> {
        let seed = match self {
            GenerationParams::Standard(p) => p.seed,
            GenerationParams::Turbo(_) => 0,
            GenerationParams::Multilingual(p) => p.seed,
        };
        (seed != 0).then_some(seed)
    }

    /// Language the text is written in; `en` for the English-only models.
    pub fn language(&self) -> &str {
        match self {
            GenerationParams::Multilingual(p) => &p.language,
            _ => crate::languages::ENGLISH,
        }
    }
}

/// Owns an engine and keeps exactly one model resident on it.
///
/// Switching kinds unloads the current model before loading the next, so
/// only one model's weights occupy memory at any time.
pub struct ModelManager<E> {
    engine: E,
    resident: Option<ModelKind>,
}

impl<E: SynthesisEngine> ModelManager<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            resident: None,
        }
    }

    /// The model currently loaded, if any.
    pub fn resident(&self) -> Option<ModelKind> {
        self.resident
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Make `kind` the resident model, evicting any other.
    pub fn ensure(&mut self, kind: ModelKind) -> Result<()> {
        if self.resident == Some(kind) {
            return Ok(());
        }
        if let Some(previous) = self.resident.take() {
            log::info!(
                "Switching from {} to {} model",
                previous.display_name(),
                kind.display_name()
            );
            self.engine.unload_model();
        }
        self.engine
            .load_model(kind)
            .map_err(|e| StudioError::ModelLoad(kind.display_name(), e.to_string()))?;
        self.resident = Some(kind);
        log::info!("{} model loaded", kind.display_name());
        Ok(())
    }

    /// Unload whatever is resident.
    pub fn unload_all(&mut self) {
        if self.resident.take().is_some() {
            self.engine.unload_model();
            log::info!("All models unloaded");
        }
    }

    /// Generate one chunk with the model `params` selects.
    pub fn synthesize(
        &mut self,
        text: &str,
        voice_prompt: Option<&Path>,
        params: &GenerationParams,
    ) -> Result<SynthesisResult> {
        self.ensure(params.kind())?;
        self.engine.synthesize(text, voice_prompt, params)
    }

    /// Run voice conversion on `source`.
    pub fn convert(&mut self, source: &Path, target_voice: Option<&Path>) -> Result<SynthesisResult> {
        self.ensure(ModelKind::Conversion)?;
        self.engine.convert(source, target_voice)
    }
}
