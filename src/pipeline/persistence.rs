// to be called on startup and quit; saves the session so it can be reloaded later
use std::path::{Path, PathBuf};

use crate::pipeline::pattern_store::PatternStore;
use crate::pipeline::project::{Pattern, ProjectState};
use crate::pipeline::song::SongChain;
use crate::sequencer::TransportSettings;

pub const STATE_DIR: &str = ".padloop";
const PROJECT_FILE: &str = "project.json";

// <project_dir>/.padloop
pub fn state_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(STATE_DIR)
}

// <project_dir>/.padloop/project.json
fn project_file_path(project_dir: &Path) -> PathBuf {
    state_dir(project_dir).join(PROJECT_FILE)
}

/// Missing file means a fresh project; a file that exists but can't be
/// parsed is logged and also treated as fresh.
pub fn load_project(project_dir: &Path) -> ProjectState {
    let path = project_file_path(project_dir);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ProjectState::default(),
        Err(e) => {
            log::warn!("could not read {}: {e}", path.display());
            return ProjectState::default();
        }
    };
    match serde_json::from_str::<serde_json::Value>(&data) {
        Ok(value) => ProjectState::from_json_value(&value),
        Err(e) => {
            log::warn!("{} is not valid json ({e}), starting fresh", path.display());
            ProjectState::default()
        }
    }
}

// Save the project state to disk, making the files if they don't exist already
pub fn save_project(project_dir: &Path, state: &ProjectState) -> anyhow::Result<()> {
    let path = project_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?; // create .padloop/ if needed
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(&path, json)?;
    log::info!("saved project to {}", path.display());
    Ok(())
}

impl ProjectState {
    pub fn capture(
        store: &PatternStore,
        transport: TransportSettings,
        song_mode: bool,
        chain: &SongChain,
    ) -> Self {
        Self {
            tempo: transport.tempo,
            swing: transport.swing,
            humanize: transport.humanize,
            slots: store.iter().map(|(slot, p)| (slot, Pattern::clone(p))).collect(),
            active_slot: store.active_slot(),
            song_mode,
            loop_song: chain.looping(),
            song_chain: chain.slots().to_vec(),
        }
    }

    pub fn to_store(&self) -> PatternStore {
        PatternStore::from_patterns(
            self.slots.iter().map(|(slot, p)| (*slot, p.clone())),
            self.active_slot,
        )
    }

    pub fn transport(&self) -> TransportSettings {
        TransportSettings {
            tempo: self.tempo,
            swing: self.swing,
            humanize: self.humanize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleId;
    use crate::pipeline::project::TrackPatch;
    use crate::shared::SlotId;

    fn busy_store() -> PatternStore {
        let mut store = PatternStore::default();
        for (i, slot) in SlotId::ALL.into_iter().enumerate() {
            store.set_active_slot(slot);
            store.toggle_step(i, i * 3);
            store.set_track(i, &TrackPatch::sample(Some(SampleId::new(format!("s{i}.wav")))));
            store.set_track(i, &TrackPatch::volume(0.25 * i as f32));
            store.set_track(i, &TrackPatch::probability(0.5));
            store.set_track(i, &TrackPatch::mute(i % 2 == 0));
        }
        store.set_active_slot(SlotId::B);
        store
    }

    #[test]
    fn save_then_load_reproduces_every_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = busy_store();
        let chain = SongChain::new(vec![SlotId::B, SlotId::D, SlotId::B], false);
        let transport = TransportSettings { tempo: 97.0, swing: 0.3, humanize: 0.6 };
        let state = ProjectState::capture(&store, transport, true, &chain);

        save_project(dir.path(), &state).unwrap();
        let loaded = load_project(dir.path());

        assert_eq!(loaded, state);
        assert_eq!(loaded.to_store(), store);
        assert_eq!(loaded.chain(), chain);
        assert_eq!(loaded.transport(), transport);
    }

    #[test]
    fn missing_project_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_project(dir.path()), ProjectState::default());
    }

    #[test]
    fn corrupt_project_is_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(state_dir(dir.path())).unwrap();
        std::fs::write(project_file_path(dir.path()), "{ not json").unwrap();
        assert_eq!(load_project(dir.path()), ProjectState::default());
    }
}
