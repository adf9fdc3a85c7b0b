//! REST API server.
//!
//! Reads its settings from the environment (see [`Config::from_env`]) and
//! talks to the inference sidecar at `CHATTERBOX_ENGINE_URL`.

use chatterbox_studio::config::Config;
use chatterbox_studio::engines::chatterbox::RemoteChatterbox;
use chatterbox_studio::server::{self, AppState};
use chatterbox_studio::voices::VoiceLibrary;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let library = VoiceLibrary::open(&config.voice_dir)?;
    log::info!(
        "Loaded {} voices from {}",
        library.len(),
        config.voice_dir.display()
    );
    if config.supabase.is_none() {
        log::warn!("Supabase not configured; uploads are disabled");
    }

    let engine = RemoteChatterbox::new(&config.engine_url);
    log::info!("Inference sidecar at {}", engine.base_url());

    let addr = config.bind_addr();
    let state = AppState::new(Box::new(engine), library, config);
    server::serve(state, &addr).await?;
    Ok(())
}
