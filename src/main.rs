use std::path::PathBuf;
use std::sync::Arc;

use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use padloop::audio;
use padloop::audio_api::AudioOutput;
use padloop::config::EngineConfig;
use padloop::loader::{SampleCache, WavDirSource};
use padloop::logging;
use padloop::middle::Middle;
use padloop::pipeline::persistence;
use padloop::sequencer::Engine;
use padloop::shared::InputEvent;
use padloop::tui;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let state_dir = persistence::state_dir(&project_dir);
    logging::init(&state_dir)?;
    let config = EngineConfig::load(&state_dir).unwrap_or_else(|e| {
        log::warn!("ignoring unreadable config: {e}");
        EngineConfig::default()
    });

    let output = Arc::new(audio::start_audio()?);
    let sample_rate = match output.sample_rate() {
        0 => config.fallback_sample_rate,
        rate => rate,
    };
    let source = WavDirSource::new(project_dir.join(&config.sample_dir), sample_rate);
    let samples = source.index().unwrap_or_else(|e| {
        log::warn!("could not list {}: {e}", source.root().display());
        Vec::new()
    });
    log::info!("{} samples in {}", samples.len(), source.root().display());

    let cache = Arc::new(SampleCache::new(Arc::new(source)));
    let engine = Engine::new(output, cache, config);
    let state = persistence::load_project(&project_dir);
    let mut middle = Middle::new(engine, &state, samples);

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let ds = middle.display_state();
        tui_state.playing = ds.playing;

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            if event == InputEvent::Quit {
                // save before quitting
                if let Err(e) = persistence::save_project(&project_dir, &middle.to_project()) {
                    log::error!("could not save project: {e}");
                }
                drop(term);
                middle.dispose();
                return Ok(());
            }
            middle.handle_input(event);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), terminal::Clear(terminal::ClearType::All));
        let _ = terminal::disable_raw_mode();
    }
}
