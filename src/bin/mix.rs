//! Add mood-matched background music to voice recordings.
//!
//! ```text
//! chatterbox-mix voice.wav --mood epic
//! chatterbox-mix voice.wav --music my_track.mp3 --output final.mp3
//! chatterbox-mix a.wav b.wav c.wav --mood emotional
//! chatterbox-mix --info
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use chatterbox_studio::mixer::{MixOptions, Mixer, Mood, DEFAULT_MUSIC_VOLUME};
use clap::Parser;

/// Cinematic audio mixer: add background music to voice files.
#[derive(Parser)]
#[command(name = "chatterbox-mix", version)]
struct Cli {
    /// Voice audio file(s) to mix with music.
    voice_files: Vec<PathBuf>,
    /// Music mood.
    #[arg(long, short, value_enum, default_value_t = Mood::Epic)]
    mood: Mood,
    /// Specific music file to use (overrides mood selection).
    #[arg(long)]
    music: Option<PathBuf>,
    /// Output file path (single file only).
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Background music volume, 0.0-1.0.
    #[arg(long, short, default_value_t = DEFAULT_MUSIC_VOLUME)]
    volume: f32,
    /// Disable automatic ducking of the music under the voice.
    #[arg(long)]
    no_ducking: bool,
    /// Show system information and exit.
    #[arg(long, short)]
    info: bool,
    /// Directory holding one folder of tracks per mood.
    #[arg(long, env = "CHATTERBOX_MUSIC_DIR", default_value = "music")]
    music_dir: PathBuf,
    /// Directory for mixed output.
    #[arg(long, env = "CHATTERBOX_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,
}

fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mixer = Mixer::new(&cli.music_dir, &cli.output_dir)?;

    if cli.info {
        println!("{}", mixer.system_report());
        return Ok(true);
    }

    if cli.voice_files.is_empty() {
        eprintln!("Error: No voice files specified");
        eprintln!("Use --help for usage information");
        return Ok(false);
    }
    if let Some(missing) = cli.voice_files.iter().find(|p| !p.exists()) {
        eprintln!("Error: File not found: {}", missing.display());
        return Ok(false);
    }
    if let Some(music) = cli.music.as_ref().filter(|p| !p.exists()) {
        eprintln!("Error: Music file not found: {}", music.display());
        return Ok(false);
    }
    if !(0.0..=1.0).contains(&cli.volume) {
        eprintln!("Error: Volume must be between 0.0 and 1.0");
        return Ok(false);
    }

    let rule = "=".repeat(60);
    if let [voice] = cli.voice_files.as_slice() {
        println!("\nCINEMATIC AUDIO MIXER\n{rule}");
        let mut builder = MixOptions::builder();
        builder
            .voice(voice.clone())
            .mood(cli.mood)
            .music_volume(cli.volume)
            .ducking(!cli.no_ducking);
        if let Some(output) = cli.output {
            builder.output(output);
        }
        if let Some(music) = cli.music {
            builder.music(music);
        }
        let options = builder.build()?;

        return match mixer.mix(&options) {
            Ok(path) => {
                println!("\nSUCCESS!\nOutput: {}", path.display());
                Ok(true)
            }
            Err(e) => {
                eprintln!("\nFAILED! {e}");
                Ok(false)
            }
        };
    }

    if cli.output.is_some() {
        eprintln!("Warning: --output ignored in batch mode");
    }
    println!("\nCINEMATIC AUDIO MIXER - BATCH MODE\n{rule}");
    let mixed = mixer.batch_mix(&cli.voice_files, cli.mood);
    if mixed.is_empty() {
        eprintln!("\nFAILED!");
        return Ok(false);
    }
    println!(
        "\nSUCCESS! Mixed {} files\nOutput directory: {}",
        mixed.len(),
        mixer.output_dir().display()
    );
    Ok(true)
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
