//! Per-platform collectors
//!
//! Every collector probes its platform once, remembers the answer for its
//! own lifetime, and turns platform files into [`SourceRecord`]s. An
//! unavailable platform yields no records rather than an error; per-file
//! and per-entry failures are logged and skipped.

pub mod launcher;
pub mod lutris;
pub mod native;
pub mod shortcuts;

pub use launcher::{LauncherACollector, LauncherBCollector, LauncherBInstall};
pub use lutris::{LutrisDb, LutrisGame};
pub use native::{NativeCatalogCollector, StoreInstall};
pub use shortcuts::ShortcutCollector;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::record::{GameSource, PlatformVariant, SourceRecord};

/// Capability shared by all platform collectors
pub trait Collector {
    /// Source tag of the records this collector normally produces
    fn source(&self) -> GameSource;

    /// Candidate filesystem locations this collector checks
    fn discover_paths(&self) -> Vec<PathBuf>;

    /// Memoized availability probe
    fn probe_state(&self) -> ProbeState;

    /// Probe (once) and report availability
    fn is_available(&self) -> bool;

    /// Read every record the platform currently has installed
    fn collect(&self) -> Vec<SourceRecord>;

    /// Installs found by the probe, one per variant and root.
    /// Defaults to the existing discovered paths, all native.
    fn installed_roots(&self) -> Vec<(PlatformVariant, PathBuf)> {
        if !self.is_available() {
            return Vec::new();
        }
        self.discover_paths()
            .into_iter()
            .filter(|path| path.exists())
            .map(|path| (PlatformVariant::Native, path))
            .collect()
    }
}

/// Probe lifecycle of a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Unprobed,
    Available,
    Unavailable,
}

/// Write-once probe result
#[derive(Debug)]
pub struct Probe<T> {
    cell: OnceLock<Option<T>>,
}

impl<T> Default for Probe<T> {
    fn default() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }
}

impl<T> Probe<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `probe` on first call only; later calls return the stored answer
    pub fn get_or_probe(&self, probe: impl FnOnce() -> Option<T>) -> Option<&T> {
        self.cell.get_or_init(probe).as_ref()
    }

    pub fn state(&self) -> ProbeState {
        match self.cell.get() {
            None => ProbeState::Unprobed,
            Some(Some(_)) => ProbeState::Available,
            Some(None) => ProbeState::Unavailable,
        }
    }
}

pub(crate) fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// Expand a leading `~/`
pub(crate) fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

/// First candidate that exists on disk
pub(crate) fn find_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.exists()).cloned()
}

/// Sorted regular files in `dir` whose name satisfies `matches`
pub(crate) fn list_files(dir: &Path, matches: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(&matches)
        })
        .collect();
    files.sort();
    files
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) enum RegistryHive {
    LocalMachine,
    CurrentUser,
}

#[cfg(target_os = "windows")]
pub(crate) fn read_registry_value(hive: RegistryHive, key: &str, value: &str) -> Option<String> {
    use winreg::RegKey;
    use winreg::enums::*;

    let root = match hive {
        RegistryHive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
        RegistryHive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
    };
    match root.open_subkey(key).and_then(|k| k.get_value::<String, _>(value)) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("Registry {}\\{} unavailable: {}", key, value, e);
            None
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub(crate) fn read_registry_value(_hive: RegistryHive, _key: &str, _value: &str) -> Option<String> {
    None
}
