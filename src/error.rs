/// Errors produced by the studio: validation, voice lookup, engine calls and I/O.
#[derive(thiserror::Error, Debug)]
pub enum StudioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{0}")]
    Validation(String),
    #[error("Voice '{0}' not found.")]
    VoiceNotFound(String),
    #[error("Voice '{0}' already exists. Please choose a different name.")]
    VoiceExists(String),
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("Model not loaded. Call load_model() first.")]
    ModelNotLoaded,
    #[error("Failed to load {0} model: {1}")]
    ModelLoad(&'static str, String),
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("Download failed: {0}")]
    Download(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(
        "FFmpeg not found. Install it from https://ffmpeg.org/download.html \
         and make sure it is on PATH."
    )]
    FfmpegNotFound,
    #[error("Mixing failed: {0}")]
    Mixer(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StudioError {
    /// True for errors caused by bad caller input rather than infrastructure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StudioError::Validation(_)
                | StudioError::VoiceNotFound(_)
                | StudioError::VoiceExists(_)
                | StudioError::UnsupportedLanguage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
