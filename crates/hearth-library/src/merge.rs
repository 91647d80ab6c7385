//! Library merging
//!
//! Runs the enabled collectors in priority order and folds their records
//! into one [`Library`] keyed by app id. A later source overwrites an
//! earlier one with the same id. Optionally drops records whose normalized
//! name was already seen.

use bitflags::bitflags;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::database::GameDatabase;
use crate::ids::ExclusionList;
use crate::layout::ArtworkLayout;
use crate::record::{GameRecord, GameSource, PlatformVariant};
use crate::sources::{
    Collector, LauncherACollector, LauncherBCollector, NativeCatalogCollector, ProbeState,
    ShortcutCollector,
};
use crate::LibraryError;
use hearth_config::LibraryConfig;

bitflags! {
    /// Which sources a scan reads
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScanOptions: u8 {
        const NATIVE_CATALOG = 1;
        const SHORTCUTS = 1 << 1;
        const LAUNCHER_A = 1 << 2;
        const LAUNCHER_B = 1 << 3;
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions::NATIVE_CATALOG | ScanOptions::SHORTCUTS
    }
}

impl ScanOptions {
    /// Build from the numeric form used in configuration. Unknown bits are
    /// dropped.
    pub fn from_config(bits: u8) -> Self {
        ScanOptions::from_bits_truncate(bits)
    }

    /// The flag that enables `source`
    pub fn for_source(source: GameSource) -> Self {
        match source {
            GameSource::NativeCatalog => ScanOptions::NATIVE_CATALOG,
            GameSource::Shortcut => ScanOptions::SHORTCUTS,
            GameSource::LauncherA => ScanOptions::LAUNCHER_A,
            GameSource::LauncherB => ScanOptions::LAUNCHER_B,
        }
    }
}

/// Insertion-ordered map of app id to record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    records: Vec<GameRecord>,
    index: HashMap<String, usize>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by app id. An overwritten record keeps its
    /// original position. Returns the previous record.
    pub fn insert(&mut self, record: GameRecord) -> Option<GameRecord> {
        match self.index.get(&record.app_id) {
            Some(&pos) => Some(std::mem::replace(&mut self.records[pos], record)),
            None => {
                self.index.insert(record.app_id.clone(), self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    pub fn get(&self, app_id: &str) -> Option<&GameRecord> {
        self.index.get(app_id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.index.contains_key(app_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GameRecord> {
        self.records.iter()
    }

    pub fn app_ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.app_id.as_str())
    }

    /// Keep only records for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&GameRecord) -> bool) {
        self.records.retain(|r| keep(r));
        self.reindex();
    }

    pub fn into_records(self) -> Vec<GameRecord> {
        self.records
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.app_id.clone(), pos))
            .collect();
    }
}

impl FromIterator<GameRecord> for Library {
    fn from_iter<I: IntoIterator<Item = GameRecord>>(iter: I) -> Self {
        let mut library = Library::new();
        for record in iter {
            library.insert(record);
        }
        library
    }
}

impl<'a> IntoIterator for &'a Library {
    type Item = &'a GameRecord;
    type IntoIter = std::slice::Iter<'a, GameRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for Library {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.app_id, record)?;
        }
        map.end()
    }
}

/// Two sources produced different records for the same app id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub app_id: String,
    pub kept: GameSource,
    pub replaced: GameSource,
}

/// Result of one scan
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub library: Library,
    pub conflicts: Vec<MergeConflict>,
    /// Records dropped as name duplicates
    pub duplicates_removed: Vec<GameRecord>,
    pub duration_ms: u64,
}

/// Probe status of one source variant. An unavailable source has a single
/// native entry with no locations.
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub source: GameSource,
    pub variant: PlatformVariant,
    pub state: ProbeState,
    pub locations: Vec<PathBuf>,
}

/// Dedup key: compatibility decomposition with combining marks dropped,
/// lowercased, surrounding whitespace removed. Non-Latin letters are kept.
pub fn normalize_name(name: &str) -> String {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Drop every record whose normalized name matches an earlier one.
/// Returns the dropped records in library order.
pub fn remove_duplicate_names(library: &mut Library) -> Vec<GameRecord> {
    let mut seen = HashSet::new();
    let mut removed = Vec::new();
    library.retain(|record| {
        if seen.insert(normalize_name(&record.name)) {
            true
        } else {
            removed.push(record.clone());
            false
        }
    });
    for record in &removed {
        tracing::info!(
            "Dropping duplicate {} ({}, {})",
            record.name,
            record.app_id,
            record.source
        );
    }
    removed
}

/// Drives the collectors and merges their output
pub struct LibraryScanner {
    collectors: Vec<Box<dyn Collector + Send + Sync>>,
    exclusions: ExclusionList,
    skip_duplicates: bool,
    layout: Option<ArtworkLayout>,
}

impl LibraryScanner {
    /// Scanner over the host's real platform locations
    pub fn new(config: &LibraryConfig) -> Self {
        let exclusions = ExclusionList::new(config.excluded_names.iter().cloned());
        let collectors: Vec<Box<dyn Collector + Send + Sync>> = vec![
            Box::new(NativeCatalogCollector::new(exclusions.clone())),
            Box::new(ShortcutCollector::new(exclusions.clone())),
            Box::new(LauncherACollector::new()),
            Box::new(LauncherBCollector::new()),
        ];
        Self::with_collectors(collectors, exclusions).skip_duplicates(config.skip_duplicates)
    }

    /// Scanner over explicit collectors. Their order is the merge priority:
    /// later collectors win id collisions.
    pub fn with_collectors(
        collectors: Vec<Box<dyn Collector + Send + Sync>>,
        exclusions: ExclusionList,
    ) -> Self {
        Self {
            collectors,
            exclusions,
            skip_duplicates: true,
            layout: None,
        }
    }

    pub fn skip_duplicates(mut self, skip: bool) -> Self {
        self.skip_duplicates = skip;
        self
    }

    /// Fill missing launcher artwork paths from `layout`
    pub fn with_artwork_layout(mut self, layout: ArtworkLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Probe state and installed locations of every collector, split by
    /// platform variant
    pub fn stores(&self) -> Vec<StoreStatus> {
        let mut statuses = Vec::new();
        for collector in &self.collectors {
            let roots = collector.installed_roots();
            let source = collector.source();
            let state = collector.probe_state();
            if roots.is_empty() {
                statuses.push(StoreStatus {
                    source,
                    variant: PlatformVariant::Native,
                    state,
                    locations: Vec::new(),
                });
                continue;
            }

            let first = statuses.len();
            for (variant, root) in roots {
                match statuses[first..].iter_mut().find(|s| s.variant == variant) {
                    Some(status) => status.locations.push(root),
                    None => statuses.push(StoreStatus {
                        source,
                        variant,
                        state,
                        locations: vec![root],
                    }),
                }
            }
        }
        statuses
    }

    pub fn scan(&self, options: ScanOptions) -> ScanOutcome {
        let start = Instant::now();
        let mut library = Library::new();
        let mut conflicts = Vec::new();

        for collector in &self.collectors {
            let source = collector.source();
            if !options.contains(ScanOptions::for_source(source)) {
                continue;
            }

            let records = collector.collect();
            tracing::info!("{}: {} records", source, records.len());

            for raw in records {
                let mut record = GameRecord::from(raw);
                if self.exclusions.is_excluded(&record.name) {
                    tracing::debug!("Excluding {} ({})", record.name, record.app_id);
                    continue;
                }
                if let Some(layout) = &self.layout {
                    layout.fill_missing(&mut record);
                }

                let app_id = record.app_id.clone();
                if let Some(previous) = library.insert(record)
                    && let Some(current) = library.get(&app_id)
                    && previous != *current
                {
                    tracing::warn!(
                        "{}: {} record replaces {} record",
                        app_id,
                        current.source,
                        previous.source
                    );
                    conflicts.push(MergeConflict {
                        app_id,
                        kept: current.source,
                        replaced: previous.source,
                    });
                }
            }
        }

        let duplicates_removed = if self.skip_duplicates {
            remove_duplicate_names(&mut library)
        } else {
            Vec::new()
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Scan complete: {} games, {} conflicts, {} duplicates removed in {}ms",
            library.len(),
            conflicts.len(),
            duplicates_removed.len(),
            duration_ms
        );

        ScanOutcome {
            library,
            conflicts,
            duplicates_removed,
            duration_ms,
        }
    }

    /// Scan, then atomically replace the stored library with the result
    pub fn scan_and_store(
        &self,
        options: ScanOptions,
        db: &mut GameDatabase,
    ) -> Result<ScanOutcome, LibraryError> {
        let outcome = self.scan(options);
        db.replace_all(&outcome.library)?;
        Ok(outcome)
    }
}
