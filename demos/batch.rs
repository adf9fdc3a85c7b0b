use std::path::Path;
use std::time::Instant;

use chatterbox_studio::batch::{write_batch_zip, BatchDriver, BatchRequest};
use chatterbox_studio::chunker::Chunker;
use chatterbox_studio::engines::chatterbox::{RemoteChatterbox, DEFAULT_ENGINE_URL};
use chatterbox_studio::mixer::{Mixer, Mood};
use chatterbox_studio::models::ModelManager;
use chatterbox_studio::voices::VoiceLibrary;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let library = VoiceLibrary::open("voice_samples")?;
    println!("Available voices: {:?}", library.display_names());
    let Some(voice) = library.display_names().into_iter().next() else {
        println!("Add a reference clip such as Morgan_male.wav to voice_samples/ first");
        return Ok(());
    };

    let url = std::env::var("CHATTERBOX_ENGINE_URL").unwrap_or_else(|_| DEFAULT_ENGINE_URL.to_string());
    let mut manager = ModelManager::new(RemoteChatterbox::new(url));
    let chunker = Chunker::default();
    let mixer = Mixer::new("music", "output")?;

    let texts = vec![
        "Welcome back. Today we look at how rivers shape the land around them.".to_string(),
        String::new(),
        "Over thousands of years, water carves valleys, moves stone and builds \
         deltas where it meets the sea. [sigh] It is patient work."
            .to_string(),
    ];
    let backgrounds = vec![None, None, mixer.select_music(Mood::Epic)];
    let request = BatchRequest::new(texts, vec![voice], true).with_backgrounds(backgrounds);

    let start = Instant::now();
    let mut run = BatchDriver::new(&mut manager, &library, &chunker)
        .with_mixer(&mixer)
        .run(request)?;
    for progress in run.by_ref() {
        println!("[{:>3}%] {}", progress.percent, progress.message);
    }
    println!("{} in {:.2?}", run.summary(), start.elapsed());
    for (index, reason) in run.failures() {
        println!("  item {}: {reason}", index + 1);
    }

    match write_batch_zip(run.results(), Path::new("output"))? {
        Some(path) => println!("Saved to {}", path.display()),
        None => println!("Nothing generated"),
    }
    Ok(())
}
