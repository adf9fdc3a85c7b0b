//! # chatterbox-studio
//!
//! Orchestration around the Chatterbox text-to-speech and voice-cloning models.
//!
//! ## Features
//!
//! - **Chunking**: sentence-aware splitting of long text, CJK aware
//! - **Voice library**: reference clips on disk, resolved from display names
//! - **One resident model**: standard, turbo, multilingual and voice conversion
//!   models are swapped in and out through a single [`models::ModelManager`]
//! - **Batch generation**: sequential generation with per-item progress
//! - **REST API** (`server` feature) and an FFmpeg background-music mixer
//!
//! ## Quick Start
//!
//! ```no_run
//! use chatterbox_studio::chunker::Chunker;
//! use chatterbox_studio::engines::chatterbox::RemoteChatterbox;
//! use chatterbox_studio::models::{GenerationParams, ModelManager};
//! use chatterbox_studio::pipeline::{generate_speech, SpeechRequest};
//! use chatterbox_studio::voices::{DefaultSamples, VoiceLibrary};
//! use std::path::Path;
//!
//! let library = VoiceLibrary::open("voice_samples")?;
//! let defaults = DefaultSamples::new(std::env::temp_dir());
//! let mut manager = ModelManager::new(RemoteChatterbox::new("http://127.0.0.1:8004"));
//!
//! let request = SpeechRequest::new("Hello, world!", GenerationParams::turbo())
//!     .with_voice("Morgan");
//! let audio = generate_speech(
//!     &mut manager,
//!     &library,
//!     &defaults,
//!     &Chunker::default(),
//!     &request,
//!     |progress| println!("{:>3}% {}", progress.percent, progress.message),
//! )?;
//! audio.write_wav(Path::new("output.wav"))?;
//! # Ok::<(), chatterbox_studio::StudioError>(())
//! ```

pub mod batch;
pub mod chunker;
pub mod config;
pub mod engines;
pub mod error;
pub mod languages;
pub mod mixer;
pub mod models;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;
pub mod voices;

pub use error::{Result, StudioError};

use std::io::Cursor;
use std::path::Path;

use models::{GenerationParams, ModelKind};

/// The result of a synthesis or conversion call.
///
/// Contains mono f32 samples and their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Raw audio samples as f32 values in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for Chatterbox)
    pub sample_rate: u32,
}

impl SynthesisResult {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Encode the audio as a 16-bit PCM WAV buffer.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                let clamped = sample.clamp(-1.0, 1.0);
                writer.write_sample((clamped * i16::MAX as f32) as i16)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Decode a WAV buffer, downmixing to mono.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        decode_wav(hound::WavReader::new(Cursor::new(bytes))?)
    }

    /// Read a WAV file, downmixing to mono.
    pub fn read_wav(path: &Path) -> Result<Self> {
        decode_wav(hound::WavReader::open(path)?)
    }

    /// Concatenate clips end to end. All clips must share one sample rate.
    pub fn concat(parts: Vec<SynthesisResult>) -> Result<Self> {
        let mut parts = parts.into_iter();
        let mut combined = parts
            .next()
            .ok_or_else(|| StudioError::Engine("No audio generated.".to_string()))?;
        for part in parts {
            if part.sample_rate != combined.sample_rate {
                return Err(StudioError::Engine(format!(
                    "Sample rate changed between chunks ({} Hz vs {} Hz)",
                    combined.sample_rate, part.sample_rate
                )));
            }
            combined.samples.extend_from_slice(&part.samples);
        }
        Ok(combined)
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn decode_wav<R: std::io::Read>(reader: hound::WavReader<R>) -> Result<SynthesisResult> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(SynthesisResult {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Common interface for Chatterbox model back ends.
///
/// An engine holds at most one loaded model. Callers normally go through
/// [`models::ModelManager`], which loads the right model before each call.
pub trait SynthesisEngine {
    /// Load the model of the given kind, replacing whatever was loaded.
    fn load_model(&mut self, kind: ModelKind) -> Result<()>;

    /// Unload the currently loaded model and free associated resources.
    fn unload_model(&mut self);

    /// Generate speech for one chunk of text.
    ///
    /// `voice_prompt` is a reference clip to clone; `None` uses the model's
    /// built-in voice.
    fn synthesize(
        &mut self,
        text: &str,
        voice_prompt: Option<&Path>,
        params: &GenerationParams,
    ) -> Result<SynthesisResult>;

    /// Re-voice `source` so it sounds like `target_voice`.
    fn convert(&mut self, source: &Path, target_voice: Option<&Path>) -> Result<SynthesisResult>;

    /// Synthesize speech and write it to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SynthesisResult::write_wav()`.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        voice_prompt: Option<&Path>,
        params: &GenerationParams,
        wav_path: &Path,
    ) -> Result<()> {
        self.synthesize(text, voice_prompt, params)?
            .write_wav(wav_path)
    }
}

impl<E: SynthesisEngine + ?Sized> SynthesisEngine for Box<E> {
    fn load_model(&mut self, kind: ModelKind) -> Result<()> {
        (**self).load_model(kind)
    }

    fn unload_model(&mut self) {
        (**self).unload_model()
    }

    fn synthesize(
        &mut self,
        text: &str,
        voice_prompt: Option<&Path>,
        params: &GenerationParams,
    ) -> Result<SynthesisResult> {
        (**self).synthesize(text, voice_prompt, params)
    }

    fn convert(&mut self, source: &Path, target_voice: Option<&Path>) -> Result<SynthesisResult> {
        (**self).convert(source, target_voice)
    }
}
