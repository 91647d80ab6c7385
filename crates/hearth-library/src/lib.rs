//! Game library discovery for Hearth
//!
//! Collects installed games from the native store catalog, user-added store
//! shortcuts and two third-party launchers, merges them into one library
//! keyed by app id, and stores the result in SQLite.

mod database;
pub mod ids;
pub mod keyvalue;
mod layout;
mod merge;
mod record;
pub mod sources;

pub use database::GameDatabase;
pub use ids::{ExclusionList, shortcut_canonical_id};
pub use keyvalue::KvError;
pub use layout::ArtworkLayout;
pub use merge::{
    Library, LibraryScanner, MergeConflict, ScanOptions, ScanOutcome, StoreStatus,
    normalize_name, remove_duplicate_names,
};
pub use record::{
    CatalogManifest, GameRecord, GameSource, LauncherAManifest, LauncherBManifest,
    PlatformVariant, ShortcutManifest, SourceRecord, StoreContext,
};
pub use sources::{Collector, ProbeState};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Key-value format error: {0}")]
    KeyValue(#[from] KvError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_errors_convert() {
        let err: LibraryError = KvError::UnexpectedEof { offset: 3 }.into();
        assert!(matches!(err, LibraryError::KeyValue(_)));
        assert!(err.to_string().contains("offset 3"));
    }
}
