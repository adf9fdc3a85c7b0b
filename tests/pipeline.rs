mod common;

use chatterbox_studio::chunker::Chunker;
use chatterbox_studio::models::{GenerationParams, ModelKind, ModelManager, StandardParams};
use chatterbox_studio::pipeline::{convert_voice, generate_speech, SpeechRequest};
use chatterbox_studio::voices::{DefaultSamples, VoiceLibrary};
use chatterbox_studio::StudioError;

use common::{clip, voice_dir, Call, ScriptedEngine, SAMPLES_PER_CHAR};

struct Fixture {
    _voices: tempfile::TempDir,
    cache: tempfile::TempDir,
    library: VoiceLibrary,
    engine: ScriptedEngine,
    manager: ModelManager<ScriptedEngine>,
}

fn fixture(engine: ScriptedEngine) -> Fixture {
    let voices = voice_dir(&["Morgan_male", "Anna_female_fr", "Anna_female"]);
    let library = VoiceLibrary::open(voices.path()).unwrap();
    Fixture {
        _voices: voices,
        cache: tempfile::tempdir().unwrap(),
        library,
        manager: ModelManager::new(engine.clone()),
        engine,
    }
}

impl Fixture {
    fn generate(&mut self, request: &SpeechRequest) -> chatterbox_studio::Result<(Vec<u8>, usize)> {
        let defaults = DefaultSamples::new(self.cache.path());
        let mut percents = Vec::new();
        let audio = generate_speech(
            &mut self.manager,
            &self.library,
            &defaults,
            &Chunker::new(3),
            request,
            |p| percents.push(p.percent),
        )?;
        Ok((percents, audio.samples.len()))
    }
}

#[test]
fn chunks_are_generated_in_order_with_the_resolved_voice() {
    let mut fx = fixture(ScriptedEngine::new());
    let request = SpeechRequest::new("One two three. Four five six.", GenerationParams::standard())
        .with_voice("Morgan \u{2642}\u{fe0f}");

    let (percents, len) = fx.generate(&request).unwrap();

    assert_eq!(fx.engine.synthesized(), vec!["One two three.", "Four five six."]);
    let morgan = fx.library.get("Morgan_male").unwrap().to_path_buf();
    assert_eq!(fx.engine.prompts(), vec![Some(morgan.clone()), Some(morgan)]);
    assert_eq!(len, 28 * SAMPLES_PER_CHAR);
    assert_eq!(percents, vec![10, 20, 40, 40, 65, 90, 100]);
}

#[test]
fn seeded_requests_report_the_seed_step() {
    let mut fx = fixture(ScriptedEngine::new());
    let params = GenerationParams::Standard(StandardParams {
        seed: 7,
        ..StandardParams::default()
    });
    let (percents, _) = fx.generate(&SpeechRequest::new("Hello.", params)).unwrap();
    assert_eq!(percents, vec![10, 20, 30, 40, 40, 90, 100]);
}

#[test]
fn multilingual_requests_prefer_the_language_specific_voice() {
    let mut fx = fixture(ScriptedEngine::new());
    let request =
        SpeechRequest::new("Bonjour.", GenerationParams::multilingual("fr")).with_voice("Anna");
    fx.generate(&request).unwrap();

    let anna_fr = fx.library.get("Anna_female_fr").unwrap().to_path_buf();
    assert_eq!(fx.engine.prompts(), vec![Some(anna_fr)]);
    assert_eq!(fx.manager.resident(), Some(ModelKind::Multilingual));
}

#[test]
fn english_multilingual_without_a_voice_uses_the_model_default() {
    let mut fx = fixture(ScriptedEngine::new());
    fx.generate(&SpeechRequest::new("Hello.", GenerationParams::multilingual("en")))
        .unwrap();
    assert_eq!(fx.engine.prompts(), vec![None]);
}

#[test]
fn switching_models_unloads_the_previous_one() {
    let mut fx = fixture(ScriptedEngine::new());
    fx.generate(&SpeechRequest::new("Hi.", GenerationParams::standard()))
        .unwrap();
    fx.generate(&SpeechRequest::new("Hi.", GenerationParams::turbo()).with_voice("Morgan"))
        .unwrap();

    let lifecycle: Vec<Call> = fx
        .engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Load(_) | Call::Unload))
        .collect();
    assert_eq!(
        lifecycle,
        vec![
            Call::Load(ModelKind::Standard),
            Call::Unload,
            Call::Load(ModelKind::Turbo)
        ]
    );
}

#[test]
fn invalid_requests_never_reach_the_engine() {
    let mut fx = fixture(ScriptedEngine::new());

    let turbo = SpeechRequest::new("Hi.", GenerationParams::turbo());
    assert!(fx.generate(&turbo).unwrap_err().is_validation());

    let unknown = SpeechRequest::new("Hi.", GenerationParams::standard()).with_voice("Nobody");
    assert!(matches!(
        fx.generate(&unknown),
        Err(StudioError::VoiceNotFound(name)) if name == "Nobody"
    ));

    assert!(fx.engine.calls().is_empty());
}

#[test]
fn load_failures_name_the_model() {
    let mut fx = fixture(ScriptedEngine::failing_load(ModelKind::Standard));
    let err = fx
        .generate(&SpeechRequest::new("Hi.", GenerationParams::standard()))
        .unwrap_err();
    assert!(matches!(err, StudioError::ModelLoad("TTS", _)));
    assert_eq!(fx.manager.resident(), None);
}

#[test]
fn voice_files_take_precedence_over_names() {
    let mut fx = fixture(ScriptedEngine::new());
    let scratch = tempfile::tempdir().unwrap();
    let file = scratch.path().join("uploaded.wav");
    clip(100).write_wav(&file).unwrap();

    let request = SpeechRequest::new("Hi.", GenerationParams::turbo()).with_voice_file(&file);
    fx.generate(&request).unwrap();
    assert_eq!(fx.engine.prompts(), vec![Some(file)]);
}

#[test]
fn conversion_uses_the_target_voice_in_any_language() {
    let mut fx = fixture(ScriptedEngine::new());
    let scratch = tempfile::tempdir().unwrap();
    let source = scratch.path().join("source.wav");
    clip(480).write_wav(&source).unwrap();

    let mut percents = Vec::new();
    let audio = convert_voice(
        &mut fx.manager,
        &fx.library,
        &source,
        Some("Morgan \u{2642}\u{fe0f}"),
        |p| percents.push(p.percent),
    )
    .unwrap();

    assert_eq!(audio.samples.len(), 480);
    assert!((audio.samples[0] - 0.25).abs() < 1e-6);
    assert_eq!(percents, vec![20, 40, 60, 70, 95, 100]);
    assert_eq!(
        fx.engine.calls().last(),
        Some(&Call::Convert {
            source: source.clone(),
            target: fx.library.get("Morgan_male").map(|p| p.to_path_buf()),
        })
    );

    let none = convert_voice(&mut fx.manager, &fx.library, &source, Some("None"), |_| {});
    assert!(none.is_ok());
    let missing = convert_voice(&mut fx.manager, &fx.library, &source, Some("Nobody"), |_| {});
    assert!(matches!(missing, Err(StudioError::VoiceNotFound(_))));
}
