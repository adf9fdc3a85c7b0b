//! JSON payloads exchanged with the inference sidecar.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{GenerationParams, MultilingualParams, StandardParams, TurboParams};

#[derive(Debug, Serialize)]
pub struct LoadRequest<'a> {
    pub model: &'a str,
}

/// Body of `POST /v1/generate`. Model parameters are flattened into the
/// top-level object.
#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub text: &'a str,
    /// Base64 reference clip, `null` for the model's built-in voice.
    pub voice_prompt: Option<String>,
    #[serde(flatten)]
    pub params: WireParams<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WireParams<'a> {
    Standard(&'a StandardParams),
    Turbo(&'a TurboParams),
    Multilingual(&'a MultilingualParams),
}

impl<'a> From<&'a GenerationParams> for WireParams<'a> {
    fn from(params: &'a GenerationParams) -> Self {
        match params {
            GenerationParams::Standard(p) => WireParams::Standard(p),
            GenerationParams::Turbo(p) => WireParams::Turbo(p),
            GenerationParams::Multilingual(p) => WireParams::Multilingual(p),
        }
    }
}

/// Body of `POST /v1/convert`.
#[derive(Debug, Serialize)]
pub struct ConvertRequest {
    pub source_audio: String,
    pub target_voice: Option<String>,
}

/// Error body returned by the sidecar on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Best human-readable message from an error response body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Some(msg), ..
        })
        | Ok(ErrorBody {
            error: Some(msg), ..
        }) => msg,
        _ => body.trim().to_string(),
    }
}

pub fn encode_file(path: &Path) -> Result<String> {
    Ok(STANDARD.encode(std::fs::read(path)?))
}

#[cfg(test)]
mod tests {
    use super::{error_message, GenerateRequest, LoadRequest};
    use crate::models::{GenerationParams, StandardParams};
    use serde_json::json;

    #[test]
    fn generate_request_flattens_params() {
        let params = GenerationParams::Standard(StandardParams {
            seed: 7,
            ..StandardParams::default()
        });
        let body = GenerateRequest {
            model: "tts",
            text: "Hello.",
            voice_prompt: None,
            params: (&params).into(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "tts");
        assert_eq!(value["voice_prompt"], serde_json::Value::Null);
        assert_eq!(value["seed"], 7);
        assert!((value["repetition_penalty"].as_f64().unwrap() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn turbo_request_has_no_extra_fields() {
        let params = GenerationParams::turbo();
        let body = GenerateRequest {
            model: "turbo",
            text: "Hi [laugh]",
            voice_prompt: Some("UklGRg==".into()),
            params: (&params).into(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"model": "turbo", "text": "Hi [laugh]", "voice_prompt": "UklGRg=="})
        );
    }

    #[test]
    fn load_request_shape() {
        assert_eq!(
            serde_json::to_value(LoadRequest { model: "vc" }).unwrap(),
            json!({"model": "vc"})
        );
    }

    #[test]
    fn error_messages_prefer_detail() {
        assert_eq!(error_message(r#"{"detail":"CUDA OOM"}"#), "CUDA OOM");
        assert_eq!(error_message(r#"{"error":"bad text"}"#), "bad text");
        assert_eq!(error_message("  gateway timeout \n"), "gateway timeout");
    }
}
