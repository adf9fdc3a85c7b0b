//! Object storage for uploaded voices.
//!
//! Uploaded clips live in a Supabase storage bucket as
//! `<id>_<gender>_<language>.<ext>`. The server only needs four operations
//! on the bucket, captured by [`VoiceStore`]; [`SupabaseStorage`] talks to
//! the Supabase REST API and [`MemoryStore`] keeps objects in memory.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::SupabaseConfig;
use crate::engines::chatterbox::protocol;
use crate::error::{Result, StudioError};

/// Message returned when an endpoint needs storage that was never configured.
pub const NOT_CONFIGURED: &str = "Supabase not configured. Set SUPABASE_URL and \
     SUPABASE_SERVICE_ROLE_KEY environment variables.";

/// Page size of a bucket listing.
const LIST_LIMIT: usize = 1000;

/// Extensions stripped from stored names before parsing metadata.
const AUDIO_EXTENSIONS: &[&str] = &[".wav", ".mp3", ".flac"];

/// A bucket of uploaded voice clips.
pub trait VoiceStore: Send + Sync {
    /// Store `bytes` under `name`.
    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Names of every object in the bucket, sorted.
    fn list(&self) -> Result<Vec<String>>;

    /// Public download URL of `name`.
    fn public_url(&self, name: &str) -> String;

    /// Delete the named objects.
    fn remove(&self, names: &[String]) -> Result<()>;
}

/// Metadata parsed from a stored object name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredVoice {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub url: String,
    pub gender: String,
    pub language: String,
    pub is_default: bool,
}

impl StoredVoice {
    /// Parse `<id>_<gender>_<lang>.<ext>`; a missing gender reads as
    /// `unknown` and a missing language as `en`.
    pub fn from_filename(filename: &str, url: impl Into<String>) -> Self {
        let stem = AUDIO_EXTENSIONS
            .iter()
            .fold(filename.to_string(), |name, ext| name.replace(ext, ""));
        let mut parts = stem.split('_');
        let id = parts.next().unwrap_or("unknown").to_string();
        let gender = parts.next().unwrap_or("unknown").to_string();
        let language = parts.next().unwrap_or("en").to_string();
        Self {
            id,
            name: filename.to_string(),
            display_name: filename.to_string(),
            url: url.into(),
            gender,
            language,
            is_default: false,
        }
    }
}

/// Every voice in `store`, with public URLs.
pub fn stored_voices(store: &dyn VoiceStore) -> Result<Vec<StoredVoice>> {
    Ok(store
        .list()?
        .iter()
        .map(|name| StoredVoice::from_filename(name, store.public_url(name)))
        .collect())
}

/// Object name for a fresh upload: `<id>_<gender>_<language>.<ext>`.
///
/// The extension comes from the uploaded file name and defaults to `wav`.
pub fn upload_name(id: &str, gender: &str, language: &str, filename: &str) -> String {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("wav");
    format!("{id}_{gender}_{language}.{ext}")
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: Option<String>,
}

/// Blocking client for one Supabase storage bucket.
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    config: SupabaseConfig,
    agent: ureq::Agent,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .build();
        Self { config, agent }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/storage/v1/{path}", self.config.url)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let key = &self.config.service_role_key;
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {key}"))
            .set("apikey", key)
    }
}

fn storage_error(action: &str, err: ureq::Error) -> StudioError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            StudioError::Storage(format!(
                "{action} returned {code}: {}",
                protocol::error_message(&body)
            ))
        }
        other => StudioError::Storage(format!("{action}: {other}")),
    }
}

impl VoiceStore for SupabaseStorage {
    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let url = self.endpoint(&format!("object/{}/{name}", self.config.bucket));
        log::info!("Uploading {name} ({} bytes) to bucket {}", bytes.len(), self.bucket());
        self.request("POST", &url)
            .set("Content-Type", content_type)
            .send_bytes(bytes)
            .map_err(|e| storage_error("upload", e))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("object/list/{}", self.config.bucket));
        let resp = self
            .request("POST", &url)
            .send_json(json!({
                "prefix": "",
                "limit": LIST_LIMIT,
                "offset": 0,
                "sortBy": { "column": "name", "order": "asc" },
            }))
            .map_err(|e| storage_error("list", e))?;

        let mut body = String::new();
        resp.into_reader().read_to_string(&mut body)?;
        let objects: Vec<ListedObject> = serde_json::from_str(&body)
            .map_err(|e| StudioError::Storage(format!("list: unexpected response: {e}")))?;
        let mut names: Vec<String> = objects.into_iter().filter_map(|o| o.name).collect();
        names.sort();
        Ok(names)
    }

    fn public_url(&self, name: &str) -> String {
        self.endpoint(&format!("object/public/{}/{name}", self.config.bucket))
    }

    fn remove(&self, names: &[String]) -> Result<()> {
        let url = self.endpoint(&format!("object/{}", self.config.bucket));
        log::info!("Removing {} object(s) from bucket {}", names.len(), self.bucket());
        self.request("DELETE", &url)
            .send_json(json!({ "prefixes": names }))
            .map_err(|e| storage_error("remove", e))?;
        Ok(())
    }
}

/// An in-process bucket; objects vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    base_url: String,
    objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
}

impl MemoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::default(),
        }
    }

    /// Stored bytes and content type of `name`.
    pub fn object(&self, name: &str) -> Option<(Vec<u8>, String)> {
        self.lock().ok()?.get(name).cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, (Vec<u8>, String)>>> {
        self.objects
            .lock()
            .map_err(|_| StudioError::Storage("memory store poisoned".to_string()))
    }
}

impl VoiceStore for MemoryStore {
    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let mut objects = self.lock()?;
        if objects.contains_key(name) {
            return Err(StudioError::Storage(format!(
                "upload returned 409: The resource already exists: {name}"
            )));
        }
        objects.insert(name.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url.trim_end_matches('/'))
    }

    fn remove(&self, names: &[String]) -> Result<()> {
        let mut objects = self.lock()?;
        for name in names {
            objects.remove(name);
        }
        Ok(())
    }
}

/// Download `url` into a temporary file that is deleted when dropped.
pub fn download_to_temp(url: &str) -> Result<tempfile::NamedTempFile> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(Duration::from_secs(60))
        .build();
    let resp = agent
        .get(url)
        .call()
        .map_err(|e| StudioError::Download(format!("{url}: {e}")))?;

    let mut file = tempfile::Builder::new()
        .prefix("voice_")
        .suffix(".wav")
        .tempfile()?;
    let bytes = std::io::copy(&mut resp.into_reader(), file.as_file_mut())?;
    log::debug!("Downloaded {bytes} bytes from {url}");
    Ok(file)
}
