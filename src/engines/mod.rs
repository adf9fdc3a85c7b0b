//! Speech synthesis engines.
//!
//! This module contains implementations of [`SynthesisEngine`](crate::SynthesisEngine).
//!
//! # Available Engines
//!
//! - `chatterbox` - Chatterbox models served by an inference sidecar over HTTP

pub mod chatterbox;
