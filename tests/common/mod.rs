#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chatterbox_studio::models::{GenerationParams, ModelKind};
use chatterbox_studio::{Result, StudioError, SynthesisEngine, SynthesisResult};

pub const SAMPLE_RATE: u32 = 24_000;

/// Samples produced per input character.
pub const SAMPLES_PER_CHAR: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(ModelKind),
    Unload,
    Synthesize {
        text: String,
        prompt: Option<PathBuf>,
        kind: ModelKind,
    },
    Convert {
        source: PathBuf,
        target: Option<PathBuf>,
    },
}

/// In-memory engine that records every call and returns audio whose length
/// depends on the input.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_load: Option<ModelKind>,
    fail_marker: Option<String>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loading `kind` fails.
    pub fn failing_load(kind: ModelKind) -> Self {
        Self {
            fail_load: Some(kind),
            ..Self::default()
        }
    }

    /// Any chunk containing `marker` fails.
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts passed to `synthesize`, in order.
    pub fn synthesized(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Synthesize { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn prompts(&self) -> Vec<Option<PathBuf>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Synthesize { prompt, .. } => Some(prompt),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SynthesisEngine for ScriptedEngine {
    fn load_model(&mut self, kind: ModelKind) -> Result<()> {
        self.record(Call::Load(kind));
        if self.fail_load == Some(kind) {
            return Err(StudioError::Engine("weights missing".to_string()));
        }
        Ok(())
    }

    fn unload_model(&mut self) {
        self.record(Call::Unload);
    }

    fn synthesize(
        &mut self,
        text: &str,
        voice_prompt: Option<&Path>,
        params: &GenerationParams,
    ) -> Result<SynthesisResult> {
        self.record(Call::Synthesize {
            text: text.to_string(),
            prompt: voice_prompt.map(Path::to_path_buf),
            kind: params.kind(),
        });
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(StudioError::Engine(format!("cannot say '{marker}'")));
            }
        }
        let samples = vec![0.25; text.chars().count() * SAMPLES_PER_CHAR];
        Ok(SynthesisResult::new(samples, SAMPLE_RATE))
    }

    fn convert(&mut self, source: &Path, target_voice: Option<&Path>) -> Result<SynthesisResult> {
        self.record(Call::Convert {
            source: source.to_path_buf(),
            target: target_voice.map(Path::to_path_buf),
        });
        let input = SynthesisResult::read_wav(source)?;
        let samples = input.samples.iter().map(|s| s * 0.5).collect();
        Ok(SynthesisResult::new(samples, input.sample_rate))
    }
}

/// A short mono clip.
pub fn clip(len: usize) -> SynthesisResult {
    SynthesisResult::new(vec![0.5; len], SAMPLE_RATE)
}

/// A temporary voice directory holding `<name>.wav` for each name.
pub fn voice_dir(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        clip(240).write_wav(&dir.path().join(format!("{name}.wav"))).unwrap();
    }
    dir
}
