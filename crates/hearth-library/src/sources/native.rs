//! Store catalog collector
//!
//! Reads `appmanifest_*.acf` files from every library folder listed in the
//! store's `libraryfolders.vdf`.

use std::path::{Path, PathBuf};

use super::{
    Collector, Probe, ProbeState, RegistryHive, expand_home, find_existing, list_files,
    read_registry_value,
};
use crate::LibraryError;
use crate::ids::ExclusionList;
use crate::keyvalue::{TextSection, text};
use crate::record::{CatalogManifest, GameSource, PlatformVariant, SourceRecord, StoreContext};

/// One store client installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInstall {
    pub root: PathBuf,
    pub launch_path: String,
    pub variant: PlatformVariant,
}

impl StoreInstall {
    pub fn new(
        root: impl Into<PathBuf>,
        launch_path: impl Into<String>,
        variant: PlatformVariant,
    ) -> Self {
        Self {
            root: root.into(),
            launch_path: launch_path.into(),
            variant,
        }
    }

    pub fn library_index(&self) -> PathBuf {
        self.root.join("steamapps").join("libraryfolders.vdf")
    }

    pub fn library_cache(&self) -> PathBuf {
        self.root.join("appcache").join("librarycache")
    }

    pub fn userdata_dir(&self) -> PathBuf {
        self.root.join("userdata")
    }

    /// An installation counts once its library index exists
    pub fn is_available(&self) -> bool {
        self.library_index().is_file()
    }

    pub fn context(&self) -> StoreContext {
        StoreContext {
            launch_path: self.launch_path.clone(),
            variant: self.variant,
        }
    }

    /// Every `steamapps` directory this installation manages
    pub fn library_roots(&self) -> Vec<PathBuf> {
        let index = match std::fs::read_to_string(self.library_index()) {
            Ok(content) => text::parse(&content),
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {}",
                    self.library_index().display(),
                    e
                );
                TextSection::default()
            }
        };
        library_roots_from_index(&index, &self.root)
    }

    /// `(user_id, shortcuts.vdf)` for every real user directory
    pub fn shortcut_files(&self) -> Vec<(String, PathBuf)> {
        let entries = match std::fs::read_dir(self.userdata_dir()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("No userdata in {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let mut files: Vec<(String, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let user = entry.file_name().to_str()?.to_string();
                // "0" is the anonymous placeholder account
                if user == "0" || !user.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                let file = entry.path().join("config").join("shortcuts.vdf");
                file.is_file().then_some((user, file))
            })
            .collect();
        files.sort();
        files
    }

    /// Well-known install locations for the current host
    pub fn host_candidates() -> Vec<StoreInstall> {
        if cfg!(target_os = "windows") {
            windows_candidates()
        } else if cfg!(target_os = "macos") {
            macos_candidates()
        } else {
            linux_candidates()
        }
    }
}

/// Resolve library folders from a parsed `libraryfolders.vdf`.
///
/// Accepts both the current layout (`"N" { "path" "..." }`) and the legacy
/// one (`"N" "..."`). The main root is always included.
pub fn library_roots_from_index(index: &TextSection, main_root: &Path) -> Vec<PathBuf> {
    let mut roots = Vec::new();

    let folders = index
        .get_section("libraryfolders")
        .or_else(|| index.get_section("LibraryFolders"));
    if let Some(folders) = folders {
        for (key, value) in folders.iter() {
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let path = match value.as_section() {
                Some(section) => section.get_str("path"),
                None => value.as_str(),
            };
            if let Some(path) = path.filter(|p| !p.is_empty()) {
                roots.push(PathBuf::from(path).join("steamapps"));
            }
        }
    }

    roots.push(main_root.join("steamapps"));

    let mut seen = std::collections::HashSet::new();
    roots.retain(|root| seen.insert(root.clone()));
    roots
}

fn linux_candidates() -> Vec<StoreInstall> {
    const FLATPAK_MARKER: &str = ".var/app/com.valvesoftware.Steam";

    let mut roots: Vec<PathBuf> = Vec::new();
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        roots.push(PathBuf::from(data_home).join("Steam"));
    }
    roots.extend(
        [
            "~/.local/share/Steam",
            "~/.var/app/com.valvesoftware.Steam/.local/share/Steam",
            "~/snap/steam/common/.local/share/Steam",
            "~/.steam/steam",
        ]
        .iter()
        .filter_map(|p| expand_home(p)),
    );

    let system_binary = find_existing(&[
        PathBuf::from("/usr/bin/steam"),
        PathBuf::from("/snap/bin/steam"),
    ]);

    roots
        .into_iter()
        .map(|root| {
            let launch = if root.to_string_lossy().contains(FLATPAK_MARKER) {
                "flatpak run com.valvesoftware.Steam".to_string()
            } else {
                system_binary
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "steam".to_string())
            };
            StoreInstall::new(root, launch, PlatformVariant::Native)
        })
        .collect()
}

fn macos_candidates() -> Vec<StoreInstall> {
    let mut installs = Vec::new();
    if let Some(root) = expand_home("~/Library/Application Support/Steam") {
        installs.push(StoreInstall::new(
            root,
            "/Applications/Steam.app/Contents/MacOS/steam_osx",
            PlatformVariant::Native,
        ));
    }
    if let Some(root) = expand_home(
        "~/Library/Application Support/CrossOver/Bottles/Steam/drive_c/Program Files (x86)/Steam",
    ) {
        installs.push(StoreInstall::new(
            root,
            r"C:\Program Files (x86)\Steam\steam.exe",
            PlatformVariant::CompatibilityLayer,
        ));
    }
    installs
}

fn windows_candidates() -> Vec<StoreInstall> {
    let mut roots = vec![PathBuf::from(r"C:\Program Files (x86)\Steam")];
    if let Some(path) = read_registry_value(
        RegistryHive::LocalMachine,
        r"SOFTWARE\WOW6432Node\Valve\Steam",
        "InstallPath",
    ) {
        roots.push(PathBuf::from(path));
    }
    if let Some(path) =
        read_registry_value(RegistryHive::CurrentUser, r"Software\Valve\Steam", "SteamPath")
    {
        roots.push(PathBuf::from(path));
    }
    for var in ["ProgramFiles(x86)", "ProgramFiles"] {
        if let Ok(dir) = std::env::var(var) {
            roots.push(PathBuf::from(dir).join("Steam"));
        }
    }

    let mut seen = std::collections::HashSet::new();
    roots
        .into_iter()
        .filter(|root| seen.insert(root.clone()))
        .map(|root| {
            let launch = root.join("steam.exe").to_string_lossy().into_owned();
            StoreInstall::new(root, launch, PlatformVariant::Native)
        })
        .collect()
}

/// First available installation of each platform variant. Candidates that
/// resolve to the same directory count once.
pub(crate) fn select_installs(candidates: &[StoreInstall]) -> Vec<StoreInstall> {
    let mut chosen: Vec<StoreInstall> = Vec::new();
    let mut seen_roots = Vec::new();

    for candidate in candidates {
        if chosen.iter().any(|c| c.variant == candidate.variant) {
            continue;
        }
        if !candidate.is_available() {
            continue;
        }
        let canonical = candidate
            .root
            .canonicalize()
            .unwrap_or_else(|_| candidate.root.clone());
        if seen_roots.contains(&canonical) {
            continue;
        }
        tracing::debug!(
            "Found {} store at {}",
            candidate.variant.as_str(),
            candidate.root.display()
        );
        seen_roots.push(canonical);
        chosen.push(candidate.clone());
    }
    chosen
}

/// Collector for the store's own catalog
pub struct NativeCatalogCollector {
    candidates: Vec<StoreInstall>,
    exclusions: ExclusionList,
    probe: Probe<Vec<StoreInstall>>,
}

impl NativeCatalogCollector {
    pub fn new(exclusions: ExclusionList) -> Self {
        Self::with_candidates(StoreInstall::host_candidates(), exclusions)
    }

    pub fn with_candidates(candidates: Vec<StoreInstall>, exclusions: ExclusionList) -> Self {
        Self {
            candidates,
            exclusions,
            probe: Probe::new(),
        }
    }

    /// Installations found by the (memoized) probe
    pub fn installs(&self) -> &[StoreInstall] {
        self.probe
            .get_or_probe(|| {
                let found = select_installs(&self.candidates);
                (!found.is_empty()).then_some(found)
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn read_manifest(
        &self,
        path: &Path,
        library_root: &Path,
        install: &StoreInstall,
    ) -> Result<Option<CatalogManifest>, LibraryError> {
        let content = std::fs::read_to_string(path)?;
        let root = text::parse(&content);
        let Some(state) = root.get_section("AppState") else {
            return Err(LibraryError::InvalidRecord(format!(
                "{}: missing AppState section",
                path.display()
            )));
        };

        let app_id = state.get_str("appid").unwrap_or_default().trim();
        let name = state.get_str("name").unwrap_or_default().trim();
        if app_id.is_empty() || name.is_empty() {
            return Err(LibraryError::InvalidRecord(format!(
                "{}: missing appid or name",
                path.display()
            )));
        }
        if self.exclusions.is_excluded(name) {
            tracing::debug!("Excluding catalog entry {} ({})", name, app_id);
            return Ok(None);
        }

        Ok(Some(CatalogManifest {
            app_id: app_id.to_string(),
            name: name.to_string(),
            install_dir: state
                .get_str("installdir")
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            library_root: library_root.to_path_buf(),
            library_cache: install.library_cache(),
            size_on_disk: state.get_str("SizeOnDisk").and_then(|s| s.parse().ok()),
            build_id: state
                .get_str("buildid")
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            store: install.context(),
        }))
    }
}

impl Collector for NativeCatalogCollector {
    fn source(&self) -> GameSource {
        GameSource::NativeCatalog
    }

    fn discover_paths(&self) -> Vec<PathBuf> {
        self.candidates.iter().map(|c| c.root.clone()).collect()
    }

    fn probe_state(&self) -> ProbeState {
        self.probe.state()
    }

    fn is_available(&self) -> bool {
        !self.installs().is_empty()
    }

    fn installed_roots(&self) -> Vec<(PlatformVariant, PathBuf)> {
        self.installs()
            .iter()
            .map(|install| (install.variant, install.root.clone()))
            .collect()
    }

    fn collect(&self) -> Vec<SourceRecord> {
        let mut records = Vec::new();

        for install in self.installs() {
            for library_root in install.library_roots() {
                let manifests = list_files(&library_root, |name| {
                    name.starts_with("appmanifest_") && name.ends_with(".acf")
                });
                for path in manifests {
                    match self.read_manifest(&path, &library_root, install) {
                        Ok(Some(manifest)) => records.push(SourceRecord::NativeCatalog(manifest)),
                        Ok(None) => {}
                        Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
                    }
                }
            }
        }

        tracing::debug!("Native catalog yielded {} records", records.len());
        records
    }
}
