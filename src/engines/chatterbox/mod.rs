//! Chatterbox engine served by an inference sidecar.
//!
//! The sidecar is a small HTTP service wrapping the Chatterbox
//! models. It keeps one model in GPU/CPU memory and exposes:
//!
//! | Method | Path | Body | Response |
//! |---|---|---|---|
//! | POST | `/v1/models/load` | `{"model": "tts" \| "turbo" \| "multilingual" \| "vc"}` | 2xx |
//! | POST | `/v1/models/unload` | `{"model": ...}` | 2xx |
//! | POST | `/v1/generate` | `{"model", "text", "voice_prompt", ...params}` | `audio/wav` |
//! | POST | `/v1/convert` | `{"source_audio", "target_voice"}` | `audio/wav` |
//!
//! Reference clips travel as base64 strings. Error responses carry a JSON
//! `{"detail": "..."}` body.
//!
//! # Examples
//!
//! ```rust,no_run
//! use chatterbox_studio::SynthesisEngine;
//! use chatterbox_studio::engines::chatterbox::RemoteChatterbox;
//! use chatterbox_studio::models::{GenerationParams, ModelKind};
//! use std::path::Path;
//!
//! let mut engine = RemoteChatterbox::new("http://127.0.0.1:8004");
//! engine.load_model(ModelKind::Multilingual)?;
//!
//! engine.synthesize_to_file(
//!     "Bonjour tout le monde !",
//!     None,
//!     &GenerationParams::multilingual("fr"),
//!     Path::new("bonjour.wav"),
//! )?;
//! # Ok::<(), chatterbox_studio::StudioError>(())
//! ```

pub mod engine;
pub mod protocol;

pub use engine::{RemoteChatterbox, DEFAULT_ENGINE_URL};
