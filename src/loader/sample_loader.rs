use std::path::{Component, Path, PathBuf};

use crate::audio::{SampleBuffer, SampleId};
use crate::error::LoadError;

/// Turns a sample identifier into decoded audio. The cache only ever talks
/// to samples through this.
pub trait SampleSource: Send + Sync {
    fn load(&self, id: &SampleId) -> Result<SampleBuffer, LoadError>;
}

// Samples live as WAV files under one directory; the identifier is the
// file's path relative to it, e.g. "Kick_Angry.wav" or "hats/Hat_Dirt.wav".
pub struct WavDirSource {
    root: PathBuf,
    target_rate: u32,
}

impl WavDirSource {
    pub fn new(root: impl Into<PathBuf>, target_rate: u32) -> Self {
        Self { root: root.into(), target_rate }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, id: &SampleId) -> Result<PathBuf, LoadError> {
        if id.is_empty() {
            return Err(LoadError::EmptyId);
        }
        let rel = Path::new(id.as_str());
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(LoadError::InvalidPath(id.clone()));
        }
        Ok(self.root.join(rel))
    }

    // Sorted list of every .wav directly in the sample dir, as identifiers
    pub fn index(&self) -> anyhow::Result<Vec<SampleId>> {
        let mut ids: Vec<SampleId> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
            })
            .filter_map(|path| path.file_name()?.to_str().map(SampleId::from))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl SampleSource for WavDirSource {
    fn load(&self, id: &SampleId) -> Result<SampleBuffer, LoadError> {
        let path = self.resolve(id)?;
        let file = std::fs::File::open(&path).map_err(|e| LoadError::Read {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        SampleBuffer::read_wav(std::io::BufReader::new(file), self.target_rate).map_err(|e| {
            LoadError::Decode {
                id: id.clone(),
                reason: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav_bytes;

    #[test]
    fn loads_wav_by_identifier() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kick.wav"), wav_bytes(1, 44100, &[0, 100, 200])).unwrap();
        let source = WavDirSource::new(dir.path(), 44100);
        let buf = source.load(&SampleId::from("kick.wav")).unwrap();
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn identifiers_cannot_escape_the_root() {
        let source = WavDirSource::new("/samples", 44100);
        assert!(matches!(
            source.resolve(&SampleId::from("../secret.wav")),
            Err(LoadError::InvalidPath(_))
        ));
        assert!(matches!(
            source.resolve(&SampleId::from("/etc/passwd")),
            Err(LoadError::InvalidPath(_))
        ));
        assert!(matches!(source.resolve(&SampleId::from("  ")), Err(LoadError::EmptyId)));
        assert_eq!(
            source.resolve(&SampleId::from("hats/Hat_Dirt.wav")).unwrap(),
            PathBuf::from("/samples/hats/Hat_Dirt.wav")
        );
    }

    #[test]
    fn missing_and_corrupt_files_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.wav"), b"RIFFnope").unwrap();
        let source = WavDirSource::new(dir.path(), 44100);
        assert!(matches!(
            source.load(&SampleId::from("absent.wav")),
            Err(LoadError::Read { .. })
        ));
        assert!(matches!(
            source.load(&SampleId::from("broken.wav")),
            Err(LoadError::Decode { .. })
        ));
    }

    #[test]
    fn index_lists_wavs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["snare.wav", "Kick.WAV", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let ids = WavDirSource::new(dir.path(), 44100).index().unwrap();
        assert_eq!(ids, vec![SampleId::from("Kick.WAV"), SampleId::from("snare.wav")]);
    }
}
