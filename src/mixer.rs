//! Background-music mixing through FFmpeg.
//!
//! Music tracks live in `<music_dir>/<mood>/`. The voice is kept in front by
//! sidechain compression: the music is ducked whenever the voice speaks.
//!
//! # System Requirements
//!
//! **ffmpeg** and **ffprobe** must be installed:
//! - **Linux**: `sudo apt-get install ffmpeg`
//! - **macOS**: `brew install ffmpeg`
//! - **Windows**: `winget install Gyan.FFmpeg` or <https://ffmpeg.org/download.html>

use std::fmt;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::{Duration, Instant};

use derive_builder::Builder;
use rand::seq::SliceRandom;

use crate::error::{Result, StudioError};
use crate::SynthesisResult;

/// Background music volume relative to the original track.
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.15;

const DUCKING_THRESHOLD_DB: i32 = -30;
const DUCKING_RATIO: u32 = 4;
const ATTACK_SECS: f32 = 0.1;
const RELEASE_SECS: f32 = 0.5;

const MIX_TIMEOUT: Duration = Duration::from_secs(300);

pub const MUSIC_EXTENSIONS: [&str; 5] = ["mp3", "wav", "m4a", "ogg", "flac"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Mood {
    #[default]
    Epic,
    Emotional,
    Uplifting,
}

impl Mood {
    pub const ALL: [Mood; 3] = [Mood::Epic, Mood::Emotional, Mood::Uplifting];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Epic => "epic",
            Mood::Emotional => "emotional",
            Mood::Uplifting => "uplifting",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                StudioError::Validation(format!(
                    "Unknown mood '{s}'. Choose epic, emotional or uplifting."
                ))
            })
    }
}

/// What to mix and how.
///
/// ```rust
/// use chatterbox_studio::mixer::{MixOptions, Mood};
///
/// let options = MixOptions::builder()
///     .voice("narration.wav")
///     .mood(Mood::Emotional)
///     .music_volume(0.2)
///     .build()?;
/// assert!(options.ducking);
/// # Ok::<(), chatterbox_studio::mixer::MixOptionsBuilderError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct MixOptions {
    #[builder(setter(into))]
    pub voice: PathBuf,
    /// Defaults to `<output_dir>/<stem>_cinematic_<mood>.mp3`.
    #[builder(setter(into, strip_option), default)]
    pub output: Option<PathBuf>,
    #[builder(default)]
    pub mood: Mood,
    /// Explicit track; overrides the random pick for `mood`.
    #[builder(setter(into, strip_option), default)]
    pub music: Option<PathBuf>,
    /// Range: 0.0–1.0, default 0.15.
    #[builder(default = "DEFAULT_MUSIC_VOLUME")]
    pub music_volume: f32,
    /// Duck the music under the voice. Default on.
    #[builder(default = "true")]
    pub ducking: bool,
}

impl MixOptions {
    pub fn builder() -> MixOptionsBuilder {
        MixOptionsBuilder::default()
    }
}

impl MixOptionsBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        match self.music_volume {
            Some(v) if !(0.0..=1.0).contains(&v) => {
                Err("Volume must be between 0.0 and 1.0".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl From<MixOptionsBuilderError> for StudioError {
    fn from(e: MixOptionsBuilderError) -> Self {
        StudioError::Validation(e.to_string())
    }
}

/// Paths of the FFmpeg binaries in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

fn common_install_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from(r"C:\Program Files\FFmpeg\bin\ffmpeg.exe"),
        PathBuf::from(r"C:\ffmpeg\bin\ffmpeg.exe"),
        PathBuf::from("/usr/local/bin/ffmpeg"),
        PathBuf::from("/opt/homebrew/bin/ffmpeg"),
    ];
    if let Some(local) = std::env::var_os("LOCALAPPDATA") {
        let local = PathBuf::from(local);
        paths.push(local.join(r"Microsoft\WinGet\Links\ffmpeg.exe"));
    }
    paths
}

fn runs(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Find a working ffmpeg: first on `PATH`, then in common install locations.
/// `ffprobe` is looked up on `PATH`, falling back to the file beside ffmpeg.
pub fn locate_ffmpeg() -> Option<FfmpegTools> {
    let ffmpeg = which::which("ffmpeg")
        .ok()
        .into_iter()
        .chain(common_install_paths())
        .find(|p| p.exists() && runs(p))?;

    let ffprobe = which::which("ffprobe").unwrap_or_else(|_| {
        let name = match ffmpeg.extension() {
            Some(ext) => format!("ffprobe.{}", ext.to_string_lossy()),
            None => "ffprobe".to_string(),
        };
        ffmpeg.with_file_name(name)
    });
    log::debug!("Using {} and {}", ffmpeg.display(), ffprobe.display());
    Some(FfmpegTools { ffmpeg, ffprobe })
}

/// FFmpeg filter graph for mixing input 0 (voice) with input 1 (music).
///
/// The music is scaled to `volume` and looped; `amix` ends with the voice.
pub fn filter_graph(volume: f32, ducking: bool) -> String {
    if ducking {
        format!(
            "[1:a]volume={volume}[music];\
             [music]aloop=loop=-1:size=2e+09[music_loop];\
             [0:a]asplit[voice_main][voice_side];\
             [music_loop][voice_side]sidechaincompress=\
             threshold={DUCKING_THRESHOLD_DB}dB:ratio={DUCKING_RATIO}:\
             attack={ATTACK_SECS}:release={RELEASE_SECS}[music_ducked];\
             [voice_main][music_ducked]amix=inputs=2:duration=first:dropout_transition=2[out]"
        )
    } else {
        format!(
            "[1:a]volume={volume},aloop=loop=-1:size=2e+09[music];\
             [0:a][music]amix=inputs=2:duration=first:dropout_transition=2"
        )
    }
}

/// Track count for one mood directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodInfo {
    pub mood: Mood,
    pub path: PathBuf,
    pub tracks: usize,
}

/// Mixes voice recordings with mood-based background music.
#[derive(Debug, Clone)]
pub struct Mixer {
    music_dir: PathBuf,
    output_dir: PathBuf,
    ffmpeg: Option<FfmpegTools>,
}

impl Mixer {
    /// Create the music and output directories and look for ffmpeg.
    pub fn new(music_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_tools(music_dir, output_dir, locate_ffmpeg())
    }

    pub fn with_tools(
        music_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        ffmpeg: Option<FfmpegTools>,
    ) -> Result<Self> {
        let mixer = Self {
            music_dir: music_dir.into(),
            output_dir: output_dir.into(),
            ffmpeg,
        };
        fs::create_dir_all(&mixer.output_dir)?;
        for mood in Mood::ALL {
            fs::create_dir_all(mixer.mood_dir(mood))?;
        }
        Ok(mixer)
    }

    pub fn music_dir(&self) -> &Path {
        &self.music_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn ffmpeg(&self) -> Option<&FfmpegTools> {
        self.ffmpeg.as_ref()
    }

    pub fn mood_dir(&self, mood: Mood) -> PathBuf {
        self.music_dir.join(mood.as_str())
    }

    /// Music tracks for `mood`, sorted by path.
    pub fn music_files(&self, mood: Mood) -> Vec<PathBuf> {
        let dir = self.mood_dir(mood);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => {
                log::warn!("Music directory not found: {}", dir.display());
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| MUSIC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();
        files
    }

    /// A random track for `mood`, or `None` when the mood has no music.
    pub fn select_music(&self, mood: Mood) -> Option<PathBuf> {
        let files = self.music_files(mood);
        let selected = files.choose(&mut rand::thread_rng()).cloned();
        match &selected {
            Some(path) => log::info!("Selected music: {}", path.display()),
            None => log::warn!(
                "No music files found for mood {mood}; add tracks to {}",
                self.mood_dir(mood).display()
            ),
        }
        selected
    }

    /// Default output path for a voice file and mood.
    pub fn default_output(&self, voice: &Path, mood: Mood) -> PathBuf {
        let stem = voice
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "voice".to_string());
        self.output_dir
            .join(format!("{stem}_cinematic_{mood}.mp3"))
    }

    fn tools(&self) -> Result<&FfmpegTools> {
        self.ffmpeg.as_ref().ok_or(StudioError::FfmpegNotFound)
    }

    /// Duration of an audio file in seconds, via ffprobe.
    pub fn audio_duration(&self, path: &Path) -> Result<f64> {
        let tools = self.tools()?;
        let output = Command::new(&tools.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(StudioError::Mixer(format!(
                "ffprobe exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<f64>().map_err(|_| {
            StudioError::Mixer(format!(
                "could not read duration of {}: '{}'",
                path.display(),
                stdout.trim()
            ))
        })
    }

    /// Mix one voice file with background music. Returns the output path.
    pub fn mix(&self, options: &MixOptions) -> Result<PathBuf> {
        let tools = self.tools()?;
        if !options.voice.is_file() {
            return Err(StudioError::Validation(format!(
                "Voice file not found: {}",
                options.voice.display()
            )));
        }

        let music = match &options.music {
            Some(path) => path.clone(),
            None => self.select_music(options.mood).ok_or_else(|| {
                StudioError::Mixer(format!("No music file available for mood {}", options.mood))
            })?,
        };
        if !music.is_file() {
            return Err(StudioError::Validation(format!(
                "Music file not found: {}",
                music.display()
            )));
        }

        let output = options
            .output
            .clone()
            .unwrap_or_else(|| self.default_output(&options.voice, options.mood));
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let duration = self.audio_duration(&options.voice)?;
        log::info!(
            "Mixing {} with {} into {}",
            options.voice.display(),
            music.display(),
            output.display()
        );

        let mut cmd = Command::new(&tools.ffmpeg);
        cmd.arg("-i")
            .arg(&options.voice)
            .arg("-i")
            .arg(&music)
            .arg("-filter_complex")
            .arg(filter_graph(options.music_volume, options.ducking));
        if options.ducking {
            cmd.args(["-map", "[out]"]);
        }
        cmd.arg("-t").arg(duration.to_string());
        cmd.args(codec_args(&output));
        cmd.arg("-y").arg(&output);

        run_with_timeout(cmd, MIX_TIMEOUT)?;
        log::info!("Audio mixed successfully: {}", output.display());
        Ok(output)
    }

    /// Mix in-memory voice audio with `music` and decode the result.
    pub fn mix_result(&self, voice: &SynthesisResult, music: &Path) -> Result<SynthesisResult> {
        let scratch = tempfile::tempdir()?;
        let voice_path = scratch.path().join("voice.wav");
        voice.write_wav(&voice_path)?;

        let options = MixOptions::builder()
            .voice(voice_path)
            .music(music)
            .output(scratch.path().join("mixed.wav"))
            .build()?;
        let mixed = self.mix(&options)?;
        SynthesisResult::read_wav(&mixed)
    }

    /// Mix several voice files with music of one mood, using default output
    /// paths. Failures are logged and skipped.
    pub fn batch_mix(&self, voices: &[PathBuf], mood: Mood) -> Vec<PathBuf> {
        let total = voices.len();
        log::info!("Batch mixing {total} files with {mood} music");

        let mut mixed = Vec::new();
        for (i, voice) in voices.iter().enumerate() {
            log::info!("[{}/{total}] Processing {}", i + 1, voice.display());
            let result = MixOptions::builder()
                .voice(voice.clone())
                .mood(mood)
                .build()
                .map_err(StudioError::from)
                .and_then(|options| self.mix(&options));
            match result {
                Ok(path) => mixed.push(path),
                Err(e) => log::warn!("Failed to mix {}: {e}", voice.display()),
            }
        }
        log::info!("Batch complete: {}/{total} files mixed", mixed.len());
        mixed
    }

    /// Every mood with its directory and track count.
    pub fn moods(&self) -> Vec<MoodInfo> {
        Mood::ALL
            .into_iter()
            .map(|mood| MoodInfo {
                mood,
                path: self.mood_dir(mood),
                tracks: self.music_files(mood).len(),
            })
            .collect()
    }

    /// Human-readable status of ffmpeg and the music library.
    pub fn system_report(&self) -> String {
        let rule = "=".repeat(60);
        let mut lines = vec![rule.clone(), "CINEMATIC AUDIO MIXER - SYSTEM INFO".to_string(), rule.clone()];

        match &self.ffmpeg {
            Some(tools) => lines.push(format!("FFmpeg: installed ({})", tools.ffmpeg.display())),
            None => {
                lines.push("FFmpeg: not found".to_string());
                lines.push(String::new());
                lines.push("To install FFmpeg:".to_string());
                lines.push("1. Download from: https://ffmpeg.org/download.html".to_string());
                lines.push("2. Extract and add to system PATH".to_string());
                lines.push("3. Restart terminal".to_string());
            }
        }

        lines.push(String::new());
        lines.push(format!("Music directory: {}", self.music_dir.display()));
        lines.push(format!("Output directory: {}", self.output_dir.display()));
        lines.push(String::new());
        lines.push("Available music:".to_string());

        let moods = self.moods();
        if moods.iter().all(|m| m.tracks == 0) {
            lines.push("No music files found!".to_string());
            lines.push("Add royalty-free tracks (Pixabay, Mixkit, FreePD) to:".to_string());
            lines.push(format!("  {}/[mood]/", self.music_dir.display()));
            lines.push("  Moods: epic, emotional, uplifting".to_string());
        } else {
            for info in moods {
                lines.push(format!("  - {}: {} tracks", info.mood, info.tracks));
            }
        }
        lines.push(rule);
        lines.join("\n")
    }
}

fn codec_args(output: &Path) -> Vec<&'static str> {
    let is_wav = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        vec!["-c:a", "pcm_s16le"]
    } else {
        vec!["-c:a", "libmp3lame", "-b:a", "192k"]
    }
}

/// Run `cmd` to completion, killing it after `timeout`.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<()> {
    let mut stderr = tempfile::tempfile()?;
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(stderr.try_clone()?)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StudioError::FfmpegNotFound
            } else {
                StudioError::Io(e)
            }
        })?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(StudioError::Mixer(
                "FFmpeg timeout - file too large or system too slow".to_string(),
            ));
        }
        std::thread::sleep(Duration::from_millis(100));
    };

    if !status.success() {
        let mut log = String::new();
        stderr.seek(SeekFrom::Start(0))?;
        stderr.read_to_string(&mut log)?;
        let tail: Vec<&str> = log.lines().rev().take(10).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(StudioError::Mixer(format!(
            "ffmpeg exited with code {:?}: {}",
            status.code(),
            tail.join("\n")
        )));
    }
    Ok(())
}
