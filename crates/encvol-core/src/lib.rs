//! Browse and manipulate the plaintext tree of an encrypted volume.
//!
//! The encryption itself lives behind [`codec::VolumeCodec`]; this crate
//! provides the session, navigation, listing, and the long-running tree
//! operations (delete, move, copy, paste, import, export) with progress
//! reporting on top of any codec.

pub mod clipboard;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod node;
pub mod operation;
pub mod path;
pub mod progress;
pub mod session;

#[cfg(feature = "async")]
pub mod async_session;

// Re-export commonly used types at crate root
pub use clipboard::{Clipboard, PasteMode, PasteOutcome};
pub use codec::{NodeId, VolumeCodec, VolumeUnlocker};
pub use config::{EngineConfig, ListingOrder};
pub use cursor::{Ascent, DirectoryCursor, Listing, ListingItem};
pub use engine::{DeleteStats, TransferStats};
pub use error::VolumeError;
pub use node::FileNode;
pub use operation::{OperationStatus, OperationTracker};
pub use path::LogicalPath;
pub use progress::{NoProgress, ProgressCounter, ProgressReporter};
pub use session::VolumeSession;

#[cfg(feature = "async")]
pub use async_session::{AsyncVolumeSession, OperationHandle};
