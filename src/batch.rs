//! Sequential batch generation with per-item progress.
//!
//! A [`BatchRun`] is an iterator: every call to `next()` performs at most one
//! unit of work (load the model, generate one item, or summarise) and
//! reports where the batch stands. The result vector always has one slot per
//! input text; empty, skipped and failed items stay `None`.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chunker::Chunker;
use crate::error::{Result, StudioError};
use crate::mixer::Mixer;
use crate::models::{GenerationParams, ModelManager};
use crate::pipeline::format_duration;
use crate::voices::VoiceLibrary;
use crate::{SynthesisEngine, SynthesisResult};

/// Texts to generate, with their voices and optional background music.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub texts: Vec<String>,
    /// One voice per text, or a single voice when `use_same_voice` is set.
    pub voices: Vec<String>,
    pub use_same_voice: bool,
    /// Empty, or one optional music track per text.
    pub backgrounds: Vec<Option<PathBuf>>,
    /// Defaults to the turbo model.
    pub params: GenerationParams,
}

impl BatchRequest {
    pub fn new(texts: Vec<String>, voices: Vec<String>, use_same_voice: bool) -> Self {
        Self {
            texts,
            voices,
            use_same_voice,
            backgrounds: Vec::new(),
            params: GenerationParams::turbo(),
        }
    }

    pub fn with_backgrounds(mut self, backgrounds: Vec<Option<PathBuf>>) -> Self {
        self.backgrounds = backgrounds;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.use_same_voice && self.voices.is_empty() {
            return Err(StudioError::Validation(
                "A voice is required when using the same voice for all items.".to_string(),
            ));
        }
        if !self.use_same_voice && self.voices.len() != self.texts.len() {
            return Err(StudioError::Validation(format!(
                "Number of voices ({}) doesn't match number of texts ({}).",
                self.voices.len(),
                self.texts.len()
            )));
        }
        if !self.backgrounds.is_empty() && self.backgrounds.len() != self.texts.len() {
            return Err(StudioError::Validation(format!(
                "Number of background tracks ({}) doesn't match number of texts ({}).",
                self.backgrounds.len(),
                self.texts.len()
            )));
        }
        Ok(())
    }

    fn voice_for(&self, index: usize) -> Option<&str> {
        let voice = if self.use_same_voice {
            self.voices.first()
        } else {
            self.voices.get(index)
        };
        voice
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != "None")
    }

    fn background_for(&self, index: usize) -> Option<&Path> {
        self.backgrounds.get(index).and_then(|b| b.as_deref())
    }
}

/// One step of a batch run.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub percent: u8,
    /// One slot per input text; `None` until (and unless) the item succeeds.
    pub results: Vec<Option<Arc<SynthesisResult>>>,
    pub message: String,
    /// Set on the last event of the run.
    pub finished: bool,
}

/// Totals for a finished (or aborted) run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs_f64();
        let average = if self.total > 0 {
            secs / self.total as f64
        } else {
            0.0
        };
        writeln!(f, "Batch generation complete!")?;
        writeln!(f, "Total items: {}", self.total)?;
        writeln!(f, "Successful: {}", self.succeeded)?;
        writeln!(f, "Failed: {}", self.failed)?;
        writeln!(f, "Total time: {}", format_duration(secs))?;
        write!(f, "Average time per item: {}", format_duration(average))
    }
}

/// Borrowed collaborators for batch generation.
pub struct BatchDriver<'a, E> {
    manager: &'a mut ModelManager<E>,
    library: &'a VoiceLibrary,
    chunker: &'a Chunker,
    mixer: Option<&'a Mixer>,
}

impl<'a, E: SynthesisEngine> BatchDriver<'a, E> {
    pub fn new(
        manager: &'a mut ModelManager<E>,
        library: &'a VoiceLibrary,
        chunker: &'a Chunker,
    ) -> Self {
        Self {
            manager,
            library,
            chunker,
            mixer: None,
        }
    }

    /// Use `mixer` for items that carry background music.
    pub fn with_mixer(mut self, mixer: &'a Mixer) -> Self {
        self.mixer = Some(mixer);
        self
    }

    /// Validate `request` and start a run. Nothing is generated until the
    /// returned iterator is advanced.
    pub fn run(self, request: BatchRequest) -> Result<BatchRun<'a, E>> {
        request.validate()?;
        let pending: Vec<usize> = request
            .texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Err(StudioError::Validation(
                "No valid text inputs provided.".to_string(),
            ));
        }

        Ok(BatchRun {
            results: vec![None; request.texts.len()],
            driver: self,
            request,
            pending,
            cursor: 0,
            succeeded: 0,
            failed: Vec::new(),
            stage: Stage::Start,
            start: Instant::now(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    LoadModel,
    Items,
    Summary,
    Done,
}

/// An in-progress batch. Iterate it to drive generation.
pub struct BatchRun<'a, E> {
    driver: BatchDriver<'a, E>,
    request: BatchRequest,
    /// Indices of non-empty texts, in input order.
    pending: Vec<usize>,
    cursor: usize,
    results: Vec<Option<Arc<SynthesisResult>>>,
    succeeded: usize,
    failed: Vec<(usize, String)>,
    stage: Stage,
    start: Instant,
}

impl<'a, E: SynthesisEngine> BatchRun<'a, E> {
    /// Current result slots.
    pub fn results(&self) -> &[Option<Arc<SynthesisResult>>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Option<Arc<SynthesisResult>>> {
        self.results
    }

    /// Failed or skipped items as `(index, reason)`.
    pub fn failures(&self) -> &[(usize, String)] {
        &self.failed
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.pending.len(),
            succeeded: self.succeeded,
            failed: self.failed.len(),
            elapsed: self.start.elapsed(),
        }
    }

    fn event(&self, percent: u8, message: String, finished: bool) -> BatchProgress {
        BatchProgress {
            percent,
            results: self.results.clone(),
            message,
            finished,
        }
    }

    fn generate(&mut self, index: usize) -> Result<SynthesisResult> {
        let params = &self.request.params;
        let name = self
            .request
            .voice_for(index)
            .ok_or_else(|| StudioError::Validation("No voice selected".to_string()))?;
        let prompt = self
            .driver
            .library
            .resolve(name, params.language())
            .ok_or_else(|| StudioError::VoiceNotFound(name.to_string()))?;

        let mut parts = Vec::new();
        for chunk in self.driver.chunker.chunks(&self.request.texts[index]) {
            parts.push(self.driver.manager.synthesize(&chunk, Some(&prompt), params)?);
        }
        let voice = SynthesisResult::concat(parts)?;

        let Some(music) = self.request.background_for(index) else {
            return Ok(voice);
        };
        if !music.is_file() {
            log::warn!("Background track {} not found; using voice only", music.display());
            return Ok(voice);
        }
        let Some(mixer) = self.driver.mixer else {
            log::warn!("No mixer configured; item {} keeps voice only", index + 1);
            return Ok(voice);
        };
        match mixer.mix_result(&voice, music) {
            Ok(mixed) => Ok(mixed),
            Err(e) => {
                log::warn!("Mixing failed for item {}: {e}; using voice only", index + 1);
                Ok(voice)
            }
        }
    }

    fn step_item(&mut self) -> BatchProgress {
        let total = self.pending.len();
        let position = self.cursor;
        let index = self.pending[position];
        self.cursor += 1;

        let message = match self.generate(index) {
            Ok(audio) => {
                self.results[index] = Some(Arc::new(audio));
                self.succeeded += 1;
                let text = &self.request.texts[index];
                let preview: String = text.chars().take(50).collect();
                format!("Item {}/{total} generated: {preview}...", position + 1)
            }
            Err(e) => {
                log::warn!("Batch item {} failed: {e}", index + 1);
                let reason = e.to_string();
                self.failed.push((index, reason.clone()));
                format!("Item {}/{total}: {reason}", position + 1)
            }
        };

        if self.cursor == total {
            self.stage = Stage::Summary;
        }
        let percent = 10 + (self.cursor * 85 / total) as u8;
        self.event(percent, message, false)
    }
}

impl<'a, E: SynthesisEngine> Iterator for BatchRun<'a, E> {
    type Item = BatchProgress;

    fn next(&mut self) -> Option<BatchProgress> {
        match self.stage {
            Stage::Start => {
                self.stage = Stage::LoadModel;
                let message = format!(
                    "Starting batch generation for {} items...",
                    self.pending.len()
                );
                log::info!("{message}");
                Some(self.event(5, message, false))
            }
            Stage::LoadModel => {
                let kind = self.request.params.kind();
                match self.driver.manager.ensure(kind) {
                    Ok(()) => {
                        self.stage = Stage::Items;
                        Some(self.event(
                            10,
                            format!("{} model loaded", kind.display_name()),
                            false,
                        ))
                    }
                    Err(e) => {
                        self.stage = Stage::Done;
                        log::error!("Batch aborted: {e}");
                        Some(self.event(0, e.to_string(), true))
                    }
                }
            }
            Stage::Items => Some(self.step_item()),
            Stage::Summary => {
                self.stage = Stage::Done;
                let summary = self.summary();
                log::info!(
                    "Batch finished: {}/{} succeeded",
                    summary.succeeded,
                    summary.total
                );
                Some(self.event(100, summary.to_string(), true))
            }
            Stage::Done => None,
        }
    }
}

/// Write every non-empty slot to `<output_dir>/batch_tts_<timestamp>.zip` as
/// `audio_NN.wav` (1-based). Returns `None` when there is nothing to write.
pub fn write_batch_zip(
    results: &[Option<Arc<SynthesisResult>>],
    output_dir: &Path,
) -> Result<Option<PathBuf>> {
    if results.iter().all(Option::is_none) {
        return Ok(None);
    }
    std::fs::create_dir_all(output_dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("batch_tts_{timestamp}.zip"));
    let mut zip = zip::ZipWriter::new(File::create(&path)?);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (i, audio) in results.iter().enumerate() {
        if let Some(audio) = audio {
            zip.start_file(format!("audio_{:02}.wav", i + 1), options)?;
            zip.write_all(&audio.to_wav_bytes()?)?;
        }
    }
    zip.finish()?;
    log::info!("Wrote batch archive {}", path.display());
    Ok(Some(path))
}
