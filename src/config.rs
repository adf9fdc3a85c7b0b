//! Runtime configuration read from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use crate::chunker::DEFAULT_MAX_UNITS;
use crate::engines::chatterbox::DEFAULT_ENGINE_URL;
use crate::error::{Result, StudioError};

/// Default bucket for uploaded voices.
pub const DEFAULT_BUCKET: &str = "voices";

/// Connection details for the Supabase storage bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub bucket: String,
}

/// Settings for the server, the mixer and the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory of voice reference clips (`CHATTERBOX_VOICE_DIR`).
    pub voice_dir: PathBuf,
    /// Mood folders of background music (`CHATTERBOX_MUSIC_DIR`).
    pub music_dir: PathBuf,
    /// Mixed audio and batch archives (`CHATTERBOX_OUTPUT_DIR`).
    pub output_dir: PathBuf,
    /// Downloaded built-in language samples (`CHATTERBOX_CACHE_DIR`).
    pub cache_dir: PathBuf,
    /// Base URL of the inference sidecar (`CHATTERBOX_ENGINE_URL`).
    pub engine_url: String,
    pub host: String,
    pub port: u16,
    /// Chunk budget in words, or characters for CJK (`CHATTERBOX_MAX_WORDS`).
    pub max_words: usize,
    pub supabase: Option<SupabaseConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voice_dir: PathBuf::from("voice_samples"),
            music_dir: PathBuf::from("music"),
            output_dir: PathBuf::from("output"),
            cache_dir: std::env::temp_dir(),
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_words: DEFAULT_MAX_UNITS,
            supabase: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                service_role_key,
                bucket: get("SUPABASE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            }),
            (Some(_), None) | (None, Some(_)) => {
                log::warn!(
                    "Supabase partially configured; set both SUPABASE_URL and \
                     SUPABASE_SERVICE_ROLE_KEY to enable voice uploads"
                );
                None
            }
            (None, None) => None,
        };

        let max_words = parse_or(
            get("CHATTERBOX_MAX_WORDS"),
            "CHATTERBOX_MAX_WORDS",
            defaults.max_words,
        )?;
        if max_words == 0 {
            return Err(StudioError::Config(
                "CHATTERBOX_MAX_WORDS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            voice_dir: path_or(get("CHATTERBOX_VOICE_DIR"), defaults.voice_dir),
            music_dir: path_or(get("CHATTERBOX_MUSIC_DIR"), defaults.music_dir),
            output_dir: path_or(get("CHATTERBOX_OUTPUT_DIR"), defaults.output_dir),
            cache_dir: path_or(get("CHATTERBOX_CACHE_DIR"), defaults.cache_dir),
            engine_url: get("CHATTERBOX_ENGINE_URL").unwrap_or(defaults.engine_url),
            host: get("CHATTERBOX_HOST").unwrap_or(defaults.host),
            port: parse_or(get("CHATTERBOX_PORT"), "CHATTERBOX_PORT", defaults.port)?,
            max_words,
            supabase,
        })
    }

    /// `host:port` to bind the HTTP server to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn path_or(value: Option<String>, default: PathBuf) -> PathBuf {
    value.map(PathBuf::from).unwrap_or(default)
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| StudioError::Config(format!("{key} has an invalid value '{raw}'"))),
        None => Ok(default),
    }
}
