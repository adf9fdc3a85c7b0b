mod common;

use chatterbox_studio::batch::{write_batch_zip, BatchDriver, BatchRequest};
use chatterbox_studio::chunker::Chunker;
use chatterbox_studio::mixer::Mixer;
use chatterbox_studio::models::{GenerationParams, ModelKind, ModelManager};
use chatterbox_studio::voices::VoiceLibrary;

use common::{voice_dir, ScriptedEngine, SAMPLES_PER_CHAR};

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn every_input_gets_a_slot_and_empty_texts_stay_empty() {
    let voices = voice_dir(&["Morgan_male", "Jane_female"]);
    let library = VoiceLibrary::open(voices.path()).unwrap();
    let engine = ScriptedEngine::new();
    let mut manager = ModelManager::new(engine.clone());
    let chunker = Chunker::default();

    let request = BatchRequest::new(
        texts(&["First line.", "   ", "Third line."]),
        vec!["Morgan".into(), "Jane".into(), "Jane \u{2640}\u{fe0f}".into()],
        false,
    );
    let mut run = BatchDriver::new(&mut manager, &library, &chunker)
        .run(request)
        .unwrap();
    let events: Vec<_> = run.by_ref().collect();

    let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
    assert_eq!(percents, vec![5, 10, 52, 95, 100]);
    assert!(events.last().unwrap().finished);
    assert!(events.iter().all(|e| e.results.len() == 3));

    let results = run.results();
    assert_eq!(results[0].as_ref().unwrap().samples.len(), 11 * SAMPLES_PER_CHAR);
    assert!(results[1].is_none());
    assert!(results[2].is_some());

    let summary = run.summary();
    assert_eq!((summary.total, summary.succeeded, summary.failed), (2, 2, 0));
    assert_eq!(engine.synthesized(), vec!["First line.", "Third line."]);
    let jane = library.get("Jane_female").unwrap().to_path_buf();
    assert_eq!(engine.prompts()[1], Some(jane));
}

#[test]
fn failed_items_are_recorded_and_the_batch_continues() {
    let voices = voice_dir(&["Morgan_male"]);
    let library = VoiceLibrary::open(voices.path()).unwrap();
    let engine = ScriptedEngine::failing_on("boom");
    let mut manager = ModelManager::new(engine.clone());
    let chunker = Chunker::default();

    let request = BatchRequest::new(
        texts(&["It goes boom.", "All good.", "Missing voice."]),
        vec!["Morgan".into(), "Morgan".into(), "Nobody".into()],
        false,
    );
    let mut run = BatchDriver::new(&mut manager, &library, &chunker)
        .run(request)
        .unwrap();
    run.by_ref().for_each(drop);

    let failed: Vec<usize> = run.failures().iter().map(|(i, _)| *i).collect();
    assert_eq!(failed, vec![0, 2]);
    assert!(run.failures()[1].1.contains("Nobody"));
    assert_eq!(run.summary().succeeded, 1);
    assert!(run.results()[1].is_some());
}

#[test]
fn a_model_that_cannot_load_ends_the_batch() {
    let voices = voice_dir(&["Morgan_male"]);
    let library = VoiceLibrary::open(voices.path()).unwrap();
    let engine = ScriptedEngine::failing_load(ModelKind::Turbo);
    let mut manager = ModelManager::new(engine.clone());
    let chunker = Chunker::default();

    let request = BatchRequest::new(texts(&["One.", "Two."]), vec!["Morgan".into()], true);
    let run = BatchDriver::new(&mut manager, &library, &chunker)
        .run(request)
        .unwrap();
    let events: Vec<_> = run.collect();

    assert_eq!(events.len(), 2);
    let last = &events[1];
    assert!(last.finished);
    assert_eq!(last.percent, 0);
    assert!(last.message.contains("Turbo TTS"));
    assert!(engine.synthesized().is_empty());
}

#[test]
fn batches_can_use_other_models() {
    let voices = voice_dir(&["Anna_female_de"]);
    let library = VoiceLibrary::open(voices.path()).unwrap();
    let engine = ScriptedEngine::new();
    let mut manager = ModelManager::new(engine.clone());
    let chunker = Chunker::default();

    let request = BatchRequest::new(texts(&["Hallo."]), vec!["Anna".into()], true)
        .with_params(GenerationParams::multilingual("de"));
    BatchDriver::new(&mut manager, &library, &chunker)
        .run(request)
        .unwrap()
        .for_each(drop);
    assert_eq!(manager.resident(), Some(ModelKind::Multilingual));
}

#[test]
fn missing_background_tracks_keep_the_voice_audio() {
    let voices = voice_dir(&["Morgan_male"]);
    let library = VoiceLibrary::open(voices.path()).unwrap();
    let mut manager = ModelManager::new(ScriptedEngine::new());
    let chunker = Chunker::default();
    let scratch = tempfile::tempdir().unwrap();
    let mixer = Mixer::with_tools(scratch.path().join("music"), scratch.path().join("out"), None)
        .unwrap();

    let request = BatchRequest::new(texts(&["Hello."]), vec!["Morgan".into()], true)
        .with_backgrounds(vec![Some(scratch.path().join("absent.mp3"))]);
    let mut run = BatchDriver::new(&mut manager, &library, &chunker)
        .with_mixer(&mixer)
        .run(request)
        .unwrap();
    run.by_ref().for_each(drop);

    assert_eq!(
        run.results()[0].as_ref().unwrap().samples.len(),
        6 * SAMPLES_PER_CHAR
    );
}

#[test]
fn empty_batches_are_rejected_and_archives_hold_generated_items() {
    let voices = voice_dir(&["Morgan_male"]);
    let library = VoiceLibrary::open(voices.path()).unwrap();
    let mut manager = ModelManager::new(ScriptedEngine::new());
    let chunker = Chunker::default();

    let empty = BatchRequest::new(texts(&["", "  "]), vec!["Morgan".into()], true);
    assert!(BatchDriver::new(&mut manager, &library, &chunker)
        .run(empty)
        .is_err());

    let request = BatchRequest::new(texts(&["A.", "", "C."]), vec!["Morgan".into()], true);
    let mut run = BatchDriver::new(&mut manager, &library, &chunker)
        .run(request)
        .unwrap();
    run.by_ref().for_each(drop);

    let out = tempfile::tempdir().unwrap();
    let path = write_batch_zip(run.results(), out.path()).unwrap().unwrap();
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["audio_01.wav", "audio_03.wav"]);
    assert!(archive.by_name("audio_01.wav").unwrap().size() > 44);
}
