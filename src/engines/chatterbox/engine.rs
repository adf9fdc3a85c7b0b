use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, StudioError};
use crate::models::{GenerationParams, ModelKind};
use crate::{SynthesisEngine, SynthesisResult};

use super::protocol::{self, ConvertRequest, GenerateRequest, LoadRequest};

/// Default address of the inference sidecar.
pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:8004";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Model loads and long chunks can take minutes on CPU.
const READ_TIMEOUT: Duration = Duration::from_secs(600);

/// Chatterbox engine backed by an HTTP inference sidecar.
///
/// The sidecar holds the model weights; this type tracks which model it
/// asked the sidecar to load and refuses to generate until one is loaded.
///
/// # Quick Start
///
/// ```rust,no_run
/// use chatterbox_studio::{SynthesisEngine, engines::chatterbox::RemoteChatterbox};
/// use chatterbox_studio::models::{GenerationParams, ModelKind};
///
/// let mut engine = RemoteChatterbox::new("http://127.0.0.1:8004");
/// engine.load_model(ModelKind::Standard)?;
/// let result = engine.synthesize("Hello, world!", None, &GenerationParams::standard())?;
/// # Ok::<(), chatterbox_studio::StudioError>(())
/// ```
pub struct RemoteChatterbox {
    base_url: String,
    agent: ureq::Agent,
    loaded: Option<ModelKind>,
}

impl Default for RemoteChatterbox {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_URL)
    }
}

impl RemoteChatterbox {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, CONNECT_TIMEOUT, READ_TIMEOUT)
    }

    pub fn with_timeouts(base_url: impl Into<String>, connect: Duration, read: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect)
            .timeout_read(read)
            .timeout_write(Duration::from_secs(60))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
            loaded: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn loaded_model(&self) -> Option<ModelKind> {
        self.loaded
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<ureq::Response> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("POST {url}");
        match self.agent.post(&url).send_json(body) {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(StudioError::Engine(format!(
                    "{path} returned {code}: {}",
                    protocol::error_message(&body)
                )))
            }
            Err(e) => Err(StudioError::Engine(format!("{url}: {e}"))),
        }
    }

    fn require(&self, kind: ModelKind) -> Result<()> {
        match self.loaded {
            Some(loaded) if loaded == kind => Ok(()),
            _ => Err(StudioError::ModelNotLoaded),
        }
    }
}

fn read_audio(resp: ureq::Response) -> Result<SynthesisResult> {
    let content_type = resp.content_type().to_string();
    let mut bytes = Vec::new();
    resp.into_reader().read_to_end(&mut bytes)?;
    if !content_type.starts_with("audio/") {
        return Err(StudioError::Engine(format!(
            "expected audio/wav, got {content_type}: {}",
            protocol::error_message(&String::from_utf8_lossy(&bytes))
        )));
    }
    SynthesisResult::from_wav_bytes(&bytes)
}

impl Drop for RemoteChatterbox {
    fn drop(&mut self) {
        self.unload_model();
    }
}

impl SynthesisEngine for RemoteChatterbox {
    fn load_model(&mut self, kind: ModelKind) -> Result<()> {
        log::info!("Loading {} model on {}", kind.display_name(), self.base_url);
        self.post("/v1/models/load", &LoadRequest {
            model: kind.as_str(),
        })?;
        self.loaded = Some(kind);
        Ok(())
    }

    fn unload_model(&mut self) {
        if let Some(kind) = self.loaded.take() {
            if let Err(e) = self.post("/v1/models/unload", &LoadRequest {
                model: kind.as_str(),
            }) {
                log::warn!("Failed to unload {} model: {e}", kind.display_name());
            }
        }
    }

    fn synthesize(
        &mut self,
        text: &str,
        voice_prompt: Option<&Path>,
        params: &GenerationParams,
    ) -> Result<SynthesisResult> {
        let kind = params.kind();
        self.require(kind)?;

        let voice_prompt = voice_prompt.map(protocol::encode_file).transpose()?;
        let resp = self.post("/v1/generate", &GenerateRequest {
            model: kind.as_str(),
            text,
            voice_prompt,
            params: params.into(),
        })?;
        read_audio(resp)
    }

    fn convert(&mut self, source: &Path, target_voice: Option<&Path>) -> Result<SynthesisResult> {
        self.require(ModelKind::Conversion)?;

        let resp = self.post("/v1/convert", &ConvertRequest {
            source_audio: protocol::encode_file(source)?,
            target_voice: target_voice.map(protocol::encode_file).transpose()?,
        })?;
        read_audio(resp)
    }
}
