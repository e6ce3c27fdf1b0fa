//! Builder for seeded in-memory test volumes.

use encvol_core::EngineConfig;
use encvol_core::codec::memory::MemoryVolume;
use encvol_core::session::VolumeSession;
use secrecy::SecretString;

use super::TEST_PASSWORD;

/// Seeds a [`MemoryVolume`] and opens a session on it.
///
/// ```ignore
/// let (volume, session) = VolumeBuilder::new()
///     .with_file("A/b.txt", b"bee")
///     .with_dir("Empty")
///     .build();
/// ```
#[derive(Default)]
pub struct VolumeBuilder {
    dirs: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
    config: EngineConfig,
}

impl VolumeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.dirs.push(path.to_string());
        self
    }

    /// Add a file; missing parent directories are created.
    pub fn with_file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.files.push((path.to_string(), content.as_ref().to_vec()));
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> (MemoryVolume, VolumeSession) {
        let volume = MemoryVolume::new(TEST_PASSWORD);
        for dir in &self.dirs {
            volume.seed_dir(dir).expect("seed dir");
        }
        for (path, content) in &self.files {
            volume.seed_file(path, content).expect("seed file");
        }
        let session = VolumeSession::unlock_with_config(
            &volume,
            &SecretString::from(TEST_PASSWORD.to_string()),
            self.config,
        )
        .expect("unlock test volume");
        (volume, session)
    }
}
