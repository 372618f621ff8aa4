use crate::audio::SampleId;
use crate::shared::SlotId;

/// Why a sample could not be made ready. Cloned out to every caller that was
/// waiting on the same in-flight load.
#[derive(Clone, Debug, thiserror::Error)]
pub enum LoadError {
    #[error("sample id is empty")]
    EmptyId,

    #[error("sample {0} resolves outside the sample directory")]
    InvalidPath(SampleId),

    #[error("failed to read {id}: {reason}")]
    Read { id: SampleId, reason: String },

    #[error("failed to decode {id}: {reason}")]
    Decode { id: SampleId, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("audio output refused to start: {0}")]
    PlaybackStart(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("slot {0} cannot be selected while song mode is playing")]
    SlotLockedBySong(SlotId),
}
