//! Shared helpers for encvol-core integration tests.
#![allow(dead_code)]

pub mod volume_builder;

use encvol_core::LogicalPath;
use encvol_core::session::VolumeSession;

pub use volume_builder::VolumeBuilder;

pub const TEST_PASSWORD: &str = "test-password-12345";

/// Parse a logical path, panicking on malformed test input.
pub fn p(path: &str) -> LogicalPath {
    LogicalPath::parse(path).expect("valid test path")
}

/// Read a volume file's full plaintext.
pub fn read_volume_file(session: &VolumeSession, path: &str) -> Vec<u8> {
    session
        .lookup(&p(path))
        .expect("lookup")
        .read_all(session)
        .expect("read")
}

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub mod test_files {
    /// Create content of exactly the specified size
    pub fn create_sized_content(size: usize) -> Vec<u8> {
        let pattern = b"0123456789ABCDEF";
        (0..size).map(|i| pattern[i % pattern.len()]).collect()
    }
}
