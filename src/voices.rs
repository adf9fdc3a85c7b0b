//! Voice reference clips on disk and resolution of display names to files.
//!
//! Voice keys follow `<name>_<gender>[_<lang>]`; English voices carry no
//! language suffix. Display names replace the gender suffix with a glyph,
//! so `Morgan_male` is shown as `Morgan ♂️`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, StudioError};
use crate::languages::{self, ENGLISH};

const MALE_GLYPH: &str = " \u{2642}\u{fe0f}";
const FEMALE_GLYPH: &str = " \u{2640}\u{fe0f}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    fn glyph(&self) -> &'static str {
        match self {
            Gender::Male => MALE_GLYPH,
            Gender::Female => FEMALE_GLYPH,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(StudioError::Validation(format!(
                "Gender must be 'male' or 'female', got '{other}'"
            ))),
        }
    }
}

/// A registered voice with the metadata encoded in its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceSample {
    /// Registry key and file stem, e.g. `Anna_female_fr`.
    pub name: String,
    /// Name without gender or language suffix, e.g. `Anna`.
    pub base_name: String,
    pub gender: Option<Gender>,
    /// Language code; `en` when the key carries no suffix.
    pub language: String,
    pub path: PathBuf,
}

impl VoiceSample {
    pub fn display_name(&self) -> String {
        match self.gender {
            Some(gender) => format!("{}{}", self.base_name, gender.glyph()),
            None => self.base_name.clone(),
        }
    }
}

/// Split a voice key into `(base_name, gender, language)`.
///
/// A trailing non-English language code is removed first, then a
/// `_male`/`_female` suffix.
pub fn parse_voice_key(key: &str) -> (&str, Option<Gender>, &str) {
    let (rest, language) = split_language_suffix(key);
    let (base, gender) = split_gender_suffix(rest);
    (base, gender, language)
}

fn split_language_suffix(key: &str) -> (&str, &'static str) {
    if let Some((rest, code)) = key.rsplit_once('_') {
        if code != ENGLISH && !rest.is_empty() {
            if let Some(lang) = languages::lookup(code) {
                return (rest, lang.code);
            }
        }
    }
    (key, ENGLISH)
}

fn split_gender_suffix(name: &str) -> (&str, Option<Gender>) {
    if let Some(base) = name.strip_suffix("_male") {
        (base, Some(Gender::Male))
    } else if let Some(base) = name.strip_suffix("_female") {
        (base, Some(Gender::Female))
    } else {
        (name, None)
    }
}

/// Format a key for display: a `_male`/`_female` suffix becomes a glyph.
pub fn display_name(key: &str) -> String {
    match split_gender_suffix(key) {
        (base, Some(gender)) => format!("{base}{}", gender.glyph()),
        (base, None) => base.to_string(),
    }
}

/// Undo [`display_name`]'s glyph so the name can be looked up again.
pub fn strip_gender_glyph(display: &str) -> String {
    display.replace(MALE_GLYPH, "").replace(FEMALE_GLYPH, "")
}

fn gender_candidates(name: &str) -> [String; 3] {
    [
        name.to_string(),
        format!("{name}_male"),
        format!("{name}_female"),
    ]
}

/// Directory-backed registry of voice reference clips.
#[derive(Debug, Clone)]
pub struct VoiceLibrary {
    dir: PathBuf,
    samples: BTreeMap<String, PathBuf>,
}

impl VoiceLibrary {
    /// Open `dir`, creating it if missing, and register every `*.wav` inside.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let mut library = Self {
            dir: dir.into(),
            samples: BTreeMap::new(),
        };
        fs::create_dir_all(&library.dir)?;
        library.reload()?;
        Ok(library)
    }

    /// Rebuild the registry from a fresh directory listing.
    pub fn reload(&mut self) -> Result<()> {
        self.samples.clear();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                self.samples.insert(stem.to_string(), path.clone());
            }
        }
        log::info!(
            "Loaded {} voices from {}",
            self.samples.len(),
            self.dir.display()
        );
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.samples.get(key).map(PathBuf::as_path)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.samples.contains_key(key)
    }

    /// Registry keys in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    /// Every voice with its parsed metadata.
    pub fn samples(&self) -> Vec<VoiceSample> {
        self.samples
            .iter()
            .map(|(key, path)| {
                let (base, gender, language) = parse_voice_key(key);
                VoiceSample {
                    name: key.clone(),
                    base_name: base.to_string(),
                    gender,
                    language: language.to_string(),
                    path: path.clone(),
                }
            })
            .collect()
    }

    /// Display names for every voice, glyph-formatted.
    pub fn display_names(&self) -> Vec<String> {
        self.names().map(display_name).collect()
    }

    /// Key for a display name in any language: the glyph is stripped and
    /// `name`, `name_male`, `name_female` are tried in that order.
    pub fn find(&self, display: &str) -> Option<&str> {
        let clean = strip_gender_glyph(display);
        gender_candidates(clean.trim())
            .iter()
            .find_map(|name| self.samples.get_key_value(name))
            .map(|(key, _)| key.as_str())
    }

    /// Voices usable for `language`, as display names.
    ///
    /// Non-English languages with a built-in sample list `Default (<Language>)`
    /// first, followed by voices carrying that language's suffix. English
    /// lists every voice that carries no other language suffix.
    pub fn voices_for_language(&self, language: &str) -> Vec<String> {
        let mut voices = Vec::new();
        if language != ENGLISH {
            if let Some(lang) = languages::lookup(language) {
                if lang.has_default_voice() {
                    voices.push(lang.default_voice_label());
                }
            }
        }

        let suffix = format!("_{language}");
        for key in self.names() {
            if let Some(rest) = key.strip_suffix(suffix.as_str()) {
                if language != ENGLISH && !rest.is_empty() {
                    voices.push(display_name(rest));
                    continue;
                }
            }
            if language == ENGLISH && split_language_suffix(key).1 == ENGLISH {
                voices.push(display_name(key));
            }
        }
        voices
    }

    /// Resolve a display name to a clip path for `language`.
    ///
    /// The glyph is stripped and an exact key wins. Otherwise `name`,
    /// `name_male` and `name_female` are tried; for non-English languages
    /// each candidate is tried with the `_<lang>` suffix before the bare
    /// candidates.
    pub fn resolve(&self, display: &str, language: &str) -> Option<PathBuf> {
        let clean = strip_gender_glyph(display);
        let clean = clean.trim();
        if clean.is_empty() {
            return None;
        }
        if let Some(path) = self.samples.get(clean) {
            return Some(path.clone());
        }

        let candidates = gender_candidates(clean);
        if language != ENGLISH {
            let suffixed = candidates
                .iter()
                .find_map(|name| self.samples.get(&format!("{name}_{language}")));
            if let Some(path) = suffixed {
                return Some(path.clone());
            }
        }
        candidates
            .iter()
            .find_map(|name| self.samples.get(name))
            .cloned()
    }

    /// Like [`resolve`](Self::resolve), but `Default (<Language>)` names
    /// resolve to the language's built-in sample, downloaded on first use.
    pub fn resolve_with_defaults(
        &self,
        display: &str,
        language: &str,
        defaults: &DefaultSamples,
    ) -> Result<Option<PathBuf>> {
        if display.starts_with("Default (") {
            return match languages::lookup(language) {
                Some(lang) if lang.has_default_voice() => defaults.fetch(lang.code).map(Some),
                _ => Ok(None),
            };
        }
        Ok(self.resolve(display, language))
    }

    /// Copy `source` into the library as `<name>_<gender>[_<lang>].wav`.
    pub fn clone_voice(
        &mut self,
        source: &Path,
        name: &str,
        language: &str,
        gender: Gender,
    ) -> Result<VoiceSample> {
        let key = voice_key(name, language, gender)?;
        if self.samples.contains_key(&key) {
            return Err(StudioError::VoiceExists(key));
        }
        if !source.is_file() {
            return Err(StudioError::Validation(format!(
                "Audio file not found: {}",
                source.display()
            )));
        }

        let dest = self.dir.join(format!("{key}.wav"));
        fs::copy(source, &dest)?;
        self.samples.insert(key.clone(), dest.clone());
        log::info!("Cloned voice '{key}' from {}", source.display());

        let (base, gender, language) = parse_voice_key(&key);
        Ok(VoiceSample {
            base_name: base.to_string(),
            gender,
            language: language.to_string(),
            name: key,
            path: dest,
        })
    }

    /// Clone several clips at once, one name per non-empty line of `names`.
    ///
    /// Each file is cloned independently; failures are reported per line.
    pub fn bulk_clone(
        &mut self,
        files: &[PathBuf],
        names: &str,
        gender: Gender,
        language: &str,
    ) -> Result<BulkCloneReport> {
        if files.is_empty() {
            return Err(StudioError::Validation("No audio files uploaded.".into()));
        }
        let names: Vec<&str> = names
            .lines()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(StudioError::Validation(
                "Please enter voice names (one per line).".into(),
            ));
        }
        if names.len() != files.len() {
            return Err(StudioError::Validation(format!(
                "Number of files ({}) doesn't match number of names ({}). \
                 Please provide exactly one name per uploaded file.",
                files.len(),
                names.len()
            )));
        }

        let mut report = BulkCloneReport::default();
        for (file, name) in files.iter().zip(names) {
            match self.clone_voice(file, name, language, gender) {
                Ok(sample) => {
                    report.succeeded += 1;
                    report
                        .lines
                        .push(format!("'{}': Cloned successfully", sample.display_name()));
                }
                Err(StudioError::VoiceExists(_)) => {
                    report.failed += 1;
                    report.lines.push(format!("'{name}': Already exists - skipped"));
                }
                Err(e) => {
                    report.failed += 1;
                    report.lines.push(format!("'{name}': Error - {e}"));
                }
            }
        }
        Ok(report)
    }

    /// Remove the voice behind a display name. Returns the removed key.
    pub fn delete_voice(&mut self, display: &str) -> Result<String> {
        let clean = strip_gender_glyph(display);
        let clean = clean.trim();
        if clean.is_empty() || clean == "None" {
            return Err(StudioError::Validation("No voice selected.".into()));
        }

        let key = self
            .find(clean)
            .map(str::to_string)
            .ok_or_else(|| StudioError::VoiceNotFound(display.to_string()))?;

        if let Some(path) = self.samples.remove(&key) {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        log::info!("Deleted voice '{key}'");
        Ok(key)
    }
}

fn voice_key(name: &str, language: &str, gender: Gender) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StudioError::Validation("Voice name cannot be empty.".into()));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(StudioError::Validation(format!(
            "Voice name '{name}' must not contain path separators"
        )));
    }

    let language = language.trim();
    let mut key = format!("{name}_{gender}");
    if !language.is_empty() && language != ENGLISH {
        if !languages::is_supported(language) {
            return Err(StudioError::UnsupportedLanguage(language.to_string()));
        }
        key.push('_');
        key.push_str(language);
    }
    Ok(key)
}

/// Outcome of [`VoiceLibrary::bulk_clone`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkCloneReport {
    pub succeeded: usize,
    pub failed: usize,
    /// One line per processed file.
    pub lines: Vec<String>,
}

impl BulkCloneReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl fmt::Display for BulkCloneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bulk cloning complete")?;
        writeln!(f)?;
        writeln!(f, "Successfully cloned: {}", self.succeeded)?;
        writeln!(f, "Failed/Skipped: {}", self.failed)?;
        writeln!(f, "Total processed: {}", self.total())?;
        writeln!(f)?;
        writeln!(f, "Details:")?;
        writeln!(f, "{}", "-".repeat(50))?;
        write!(f, "{}", self.lines.join("\n"))
    }
}

/// Cache of the built-in per-language reference clips.
///
/// Each clip is downloaded once to `<cache_dir>/chatterbox_sample_<code>.flac`
/// and reused afterwards.
#[derive(Debug, Clone)]
pub struct DefaultSamples {
    cache_dir: PathBuf,
    agent: ureq::Agent,
}

impl DefaultSamples {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .build();
        Self {
            cache_dir: cache_dir.into(),
            agent,
        }
    }

    pub fn cache_path(&self, language: &str) -> PathBuf {
        self.cache_dir
            .join(format!("chatterbox_sample_{language}.flac"))
    }

    /// Local path of the built-in clip for `language`, downloading it if needed.
    pub fn fetch(&self, language: &str) -> Result<PathBuf> {
        let lang = languages::lookup(language)
            .ok_or_else(|| StudioError::UnsupportedLanguage(language.to_string()))?;
        let url = lang.sample_url.ok_or_else(|| {
            StudioError::VoiceNotFound(format!("Default ({})", lang.name))
        })?;

        let dest = self.cache_path(lang.code);
        if dest.exists() {
            return Ok(dest);
        }

        log::info!("Downloading sample audio for {} from {url}", lang.code);
        fs::create_dir_all(&self.cache_dir)?;
        let resp = self
            .agent
            .get(url)
            .call()
            .map_err(|e| StudioError::Download(format!("{url}: {e}")))?;

        let tmp = dest.with_extension("part");
        let mut file = fs::File::create(&tmp)?;
        std::io::copy(&mut resp.into_reader(), &mut file)?;
        drop(file);
        fs::rename(&tmp, &dest)?;
        log::info!("Downloaded to {}", dest.display());
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        display_name, parse_voice_key, strip_gender_glyph, DefaultSamples, Gender, VoiceLibrary,
    };
    use crate::StudioError;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn library_with(keys: &[&str]) -> (tempfile::TempDir, VoiceLibrary) {
        let dir = tempfile::tempdir().unwrap();
        for key in keys {
            fs::write(dir.path().join(format!("{key}.wav")), b"RIFF").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        let library = VoiceLibrary::open(dir.path()).unwrap();
        (dir, library)
    }

    fn stem(path: Option<PathBuf>) -> Option<String> {
        path.and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
    }

    #[test]
    fn open_registers_only_wav_files() {
        let (_dir, library) = library_with(&["Morgan_male", "Anna_female_fr"]);
        assert_eq!(
            library.names().collect::<Vec<_>>(),
            vec!["Anna_female_fr", "Morgan_male"]
        );
    }

    #[test]
    fn keys_parse_into_metadata() {
        assert_eq!(
            parse_voice_key("Anna_female_fr"),
            ("Anna", Some(Gender::Female), "fr")
        );
        assert_eq!(parse_voice_key("Morgan_male"), ("Morgan", Some(Gender::Male), "en"));
        assert_eq!(parse_voice_key("narrator"), ("narrator", None, "en"));
        // "xx" is not a supported code, so it stays in the name
        assert_eq!(parse_voice_key("mix_xx"), ("mix_xx", None, "en"));
    }

    #[test]
    fn glyphs_round_trip() {
        let shown = display_name("Morgan_male");
        assert_eq!(shown, "Morgan \u{2642}\u{fe0f}");
        assert_eq!(strip_gender_glyph(&shown), "Morgan");
        assert_eq!(display_name("narrator"), "narrator");
    }

    #[test]
    fn voices_for_english_exclude_other_languages() {
        let (_dir, library) = library_with(&["Morgan_male", "Anna_female_fr", "narrator"]);
        assert_eq!(
            library.voices_for_language("en"),
            vec!["Morgan \u{2642}\u{fe0f}".to_string(), "narrator".to_string()]
        );
    }

    #[test]
    fn voices_for_french_list_default_first() {
        let (_dir, library) = library_with(&["Morgan_male", "Anna_female_fr"]);
        assert_eq!(
            library.voices_for_language("fr"),
            vec![
                "Default (French)".to_string(),
                "Anna \u{2640}\u{fe0f}".to_string()
            ]
        );
    }

    #[test]
    fn resolve_prefers_exact_key_then_suffixes() {
        let (_dir, library) = library_with(&["Morgan_male", "Anna_female_fr", "Anna_female"]);

        assert_eq!(stem(library.resolve("Morgan \u{2642}\u{fe0f}", "en")).as_deref(), Some("Morgan_male"));
        assert_eq!(stem(library.resolve("Anna", "fr")).as_deref(), Some("Anna_female_fr"));
        assert_eq!(stem(library.resolve("Anna", "en")).as_deref(), Some("Anna_female"));
        assert_eq!(stem(library.resolve("Anna_female_fr", "en")).as_deref(), Some("Anna_female_fr"));
        // Falls back to the unsuffixed voice for other languages
        assert_eq!(stem(library.resolve("Morgan", "de")).as_deref(), Some("Morgan_male"));
        assert_eq!(library.resolve("Nobody", "en"), None);
        assert_eq!(library.resolve("", "en"), None);
    }

    #[test]
    fn resolve_is_deterministic() {
        let (_dir, library) = library_with(&["Sam", "Sam_male", "Sam_female"]);
        for _ in 0..3 {
            assert_eq!(stem(library.resolve("Sam", "en")).as_deref(), Some("Sam"));
        }
    }

    #[test]
    fn default_voice_uses_cached_sample() {
        let (_dir, library) = library_with(&[]);
        let cache = tempfile::tempdir().unwrap();
        let defaults = DefaultSamples::new(cache.path());
        fs::write(defaults.cache_path("fr"), b"fLaC").unwrap();

        let resolved = library
            .resolve_with_defaults("Default (French)", "fr", &defaults)
            .unwrap();
        assert_eq!(resolved, Some(cache.path().join("chatterbox_sample_fr.flac")));

        let english = library
            .resolve_with_defaults("Default (English)", "en", &defaults)
            .unwrap();
        assert_eq!(english, None);
    }

    #[test]
    fn clone_builds_suffixed_key_and_rejects_duplicates() {
        let (dir, mut library) = library_with(&[]);
        let source = dir.path().join("upload.bin");
        fs::write(&source, b"RIFF").unwrap();

        let sample = library
            .clone_voice(&source, " Anna ", "fr", Gender::Female)
            .unwrap();
        assert_eq!(sample.name, "Anna_female_fr");
        assert_eq!(sample.base_name, "Anna");
        assert_eq!(sample.language, "fr");
        assert!(sample.path.exists());
        assert!(library.contains("Anna_female_fr"));

        let english = library.clone_voice(&source, "Anna", "en", Gender::Female).unwrap();
        assert_eq!(english.name, "Anna_female");

        let err = library
            .clone_voice(&source, "Anna", "fr", Gender::Female)
            .unwrap_err();
        assert!(matches!(err, StudioError::VoiceExists(ref k) if k == "Anna_female_fr"));
    }

    #[test]
    fn clone_validates_name_and_language() {
        let (dir, mut library) = library_with(&[]);
        let source = dir.path().join("upload.bin");
        fs::write(&source, b"RIFF").unwrap();

        assert!(library.clone_voice(&source, "  ", "en", Gender::Male).unwrap_err().is_validation());
        assert!(library.clone_voice(&source, "../x", "en", Gender::Male).unwrap_err().is_validation());
        assert!(matches!(
            library.clone_voice(&source, "x", "xx", Gender::Male),
            Err(StudioError::UnsupportedLanguage(_))
        ));
        assert!(library.clone_voice(Path::new("/no/such/file.wav"), "x", "en", Gender::Male).is_err());
        assert!(library.is_empty());
    }

    #[test]
    fn bulk_clone_reports_each_file() {
        let (dir, mut library) = library_with(&["Bob_male"]);
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"RIFF").unwrap();
        fs::write(&b, b"RIFF").unwrap();

        let report = library
            .bulk_clone(&[a.clone(), b.clone()], "Alice\n\n Bob \n", Gender::Male, "en")
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.lines.len(), 2);
        assert!(report.lines[1].contains("Already exists"));
        assert!(report.to_string().contains("Total processed: 2"));

        let mismatch = library.bulk_clone(&[a], "One\nTwo", Gender::Male, "en");
        assert!(mismatch.unwrap_err().is_validation());
    }

    #[test]
    fn delete_resolves_display_name() {
        let (dir, mut library) = library_with(&["Morgan_male"]);
        let removed = library.delete_voice("Morgan \u{2642}\u{fe0f}").unwrap();
        assert_eq!(removed, "Morgan_male");
        assert!(!dir.path().join("Morgan_male.wav").exists());
        assert!(library.is_empty());

        assert!(matches!(
            library.delete_voice("Morgan"),
            Err(StudioError::VoiceNotFound(_))
        ));
        assert!(library.delete_voice("None").unwrap_err().is_validation());
    }

    #[test]
    fn find_ignores_language_suffixes() {
        let (_dir, library) = library_with(&["Morgan_male", "Anna_female_fr"]);
        assert_eq!(library.find("Morgan \u{2642}\u{fe0f}"), Some("Morgan_male"));
        assert_eq!(library.find("Anna"), None);
        assert_eq!(library.find("Anna_female_fr"), Some("Anna_female_fr"));
    }

    #[test]
    fn reload_picks_up_external_changes() {
        let (dir, mut library) = library_with(&["Morgan_male"]);
        fs::write(dir.path().join("Zoe_female.wav"), b"RIFF").unwrap();
        assert_eq!(library.len(), 1);
        library.reload().unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.samples()[1].gender, Some(Gender::Female));
    }
}
