//! Third-party launcher collectors
//!
//! Launcher A keeps one JSON `*.item` manifest per installed title. Launcher
//! B keeps a single `installed.json` keyed by app name. When launcher A is
//! not installed, its collector returns whatever launcher B reports.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{
    Collector, Probe, ProbeState, RegistryHive, expand_home, list_files, read_registry_value,
};
use crate::LibraryError;
use crate::record::{
    GameSource, LauncherAManifest, LauncherBManifest, PlatformVariant, SourceRecord,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemManifest {
    #[serde(default)]
    app_name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    install_location: String,
    #[serde(default)]
    launch_executable: String,
    main_game_catalog_namespace: Option<String>,
    main_game_catalog_item_id: Option<String>,
}

pub struct LauncherACollector {
    manifest_dirs: Vec<PathBuf>,
    probe: Probe<PathBuf>,
    fallback: LauncherBCollector,
}

impl LauncherACollector {
    pub fn new() -> Self {
        Self::with_dirs(Self::host_manifest_dirs(), LauncherBCollector::new())
    }

    pub fn with_dirs(manifest_dirs: Vec<PathBuf>, fallback: LauncherBCollector) -> Self {
        Self {
            manifest_dirs,
            probe: Probe::new(),
            fallback,
        }
    }

    /// Manifest directories checked on the current host
    pub fn host_manifest_dirs() -> Vec<PathBuf> {
        if !cfg!(target_os = "windows") {
            return Vec::new();
        }

        let mut dirs = Vec::new();
        if let Some(data) = read_registry_value(
            RegistryHive::LocalMachine,
            r"SOFTWARE\WOW6432Node\Epic Games\EpicGamesLauncher",
            "AppDataPath",
        ) {
            dirs.push(PathBuf::from(data).join("Manifests"));
        }
        if let Ok(program_data) = std::env::var("PROGRAMDATA") {
            dirs.push(
                PathBuf::from(program_data)
                    .join("Epic")
                    .join("EpicGamesLauncher")
                    .join("Data")
                    .join("Manifests"),
            );
        }
        dirs.push(PathBuf::from(
            r"C:\ProgramData\Epic\EpicGamesLauncher\Data\Manifests",
        ));
        dirs
    }

    fn manifest_dir(&self) -> Option<&PathBuf> {
        self.probe.get_or_probe(|| {
            self.manifest_dirs.iter().find(|dir| dir.is_dir()).cloned()
        })
    }

    fn read_item(path: &Path) -> Result<Option<LauncherAManifest>, LibraryError> {
        let content = std::fs::read_to_string(path)?;
        let item: ItemManifest = serde_json::from_str(&content)?;
        if item.app_name.is_empty() || item.display_name.is_empty() {
            return Ok(None);
        }
        Ok(Some(LauncherAManifest {
            app_name: item.app_name,
            display_name: item.display_name,
            install_location: item.install_location,
            launch_executable: item.launch_executable,
            catalog_namespace: item.main_game_catalog_namespace,
            catalog_item_id: item.main_game_catalog_item_id,
        }))
    }
}

impl Default for LauncherACollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for LauncherACollector {
    fn source(&self) -> GameSource {
        GameSource::LauncherA
    }

    fn discover_paths(&self) -> Vec<PathBuf> {
        self.manifest_dirs.clone()
    }

    fn probe_state(&self) -> ProbeState {
        self.probe.state()
    }

    fn is_available(&self) -> bool {
        self.manifest_dir().is_some()
    }

    fn collect(&self) -> Vec<SourceRecord> {
        let Some(dir) = self.manifest_dir() else {
            tracing::debug!("Launcher A not found, reading launcher B instead");
            return self.fallback.collect();
        };

        let mut records = Vec::new();
        for path in list_files(dir, |name| name.ends_with(".item")) {
            match Self::read_item(&path) {
                Ok(Some(manifest)) => records.push(SourceRecord::LauncherA(manifest)),
                Ok(None) => tracing::debug!("Skipping incomplete {}", path.display()),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        tracing::debug!("Launcher A yielded {} records", records.len());
        records
    }
}

#[derive(Debug, Deserialize)]
struct InstalledEntry {
    #[serde(default)]
    app_name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    install_path: String,
    #[serde(default)]
    executable: String,
    platform: Option<String>,
    version: Option<String>,
}

/// One launcher B configuration directory and the command that starts it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherBInstall {
    pub config_dir: PathBuf,
    pub launch_command: String,
}

impl LauncherBInstall {
    pub fn new(config_dir: impl Into<PathBuf>, launch_command: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
            launch_command: launch_command.into(),
        }
    }

    pub fn installed_file(&self) -> PathBuf {
        self.config_dir.join("installed.json")
    }

    pub fn host_candidates() -> Vec<LauncherBInstall> {
        const SUFFIX: &str = "heroic/legendaryConfig/legendary";

        let mut installs = Vec::new();
        if cfg!(target_os = "windows") {
            if let Ok(appdata) = std::env::var("APPDATA") {
                installs.push(Self::new(PathBuf::from(appdata).join(SUFFIX), "heroic"));
            }
            return installs;
        }
        if cfg!(target_os = "macos") {
            if let Some(dir) = expand_home(&format!("~/Library/Application Support/{SUFFIX}")) {
                installs.push(Self::new(dir, "/Applications/Heroic.app/Contents/MacOS/Heroic"));
            }
            return installs;
        }

        if let Some(dir) =
            expand_home(&format!("~/.var/app/com.heroicgameslauncher.hgl/config/{SUFFIX}"))
        {
            installs.push(Self::new(dir, "flatpak run com.heroicgameslauncher.hgl"));
        }
        if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
            installs.push(Self::new(PathBuf::from(config_home).join(SUFFIX), "heroic"));
        }
        if let Some(dir) = expand_home(&format!("~/.config/{SUFFIX}")) {
            installs.push(Self::new(dir, "heroic"));
        }
        installs
    }
}

pub struct LauncherBCollector {
    candidates: Vec<LauncherBInstall>,
    probe: Probe<LauncherBInstall>,
}

impl LauncherBCollector {
    pub fn new() -> Self {
        Self::with_candidates(LauncherBInstall::host_candidates())
    }

    pub fn with_candidates(candidates: Vec<LauncherBInstall>) -> Self {
        Self {
            candidates,
            probe: Probe::new(),
        }
    }

    fn install(&self) -> Option<&LauncherBInstall> {
        self.probe.get_or_probe(|| {
            self.candidates
                .iter()
                .find(|c| c.installed_file().is_file())
                .cloned()
        })
    }

    fn read_installed(
        install: &LauncherBInstall,
    ) -> Result<Vec<LauncherBManifest>, LibraryError> {
        let content = std::fs::read_to_string(install.installed_file())?;
        let entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;

        let mut manifests = Vec::new();
        for (key, value) in entries {
            let entry: InstalledEntry = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping launcher B entry {}: {}", key, e);
                    continue;
                }
            };
            let app_name = if entry.app_name.is_empty() {
                key
            } else {
                entry.app_name
            };
            if entry.title.is_empty() {
                tracing::debug!("Launcher B entry {} has no title", app_name);
                continue;
            }
            let variant = variant_for(entry.platform.as_deref());
            manifests.push(LauncherBManifest {
                app_name,
                title: entry.title,
                install_path: entry.install_path,
                executable: entry.executable,
                platform: entry.platform,
                version: entry.version,
                launch_command: install.launch_command.clone(),
                variant,
            });
        }
        Ok(manifests)
    }
}

impl Default for LauncherBCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Windows builds on any other host run through a compatibility layer
fn variant_for(platform: Option<&str>) -> PlatformVariant {
    match platform {
        Some(p) if p.eq_ignore_ascii_case("windows") && !cfg!(target_os = "windows") => {
            PlatformVariant::CompatibilityLayer
        }
        _ => PlatformVariant::Native,
    }
}

impl Collector for LauncherBCollector {
    fn source(&self) -> GameSource {
        GameSource::LauncherB
    }

    fn discover_paths(&self) -> Vec<PathBuf> {
        self.candidates.iter().map(|c| c.config_dir.clone()).collect()
    }

    fn probe_state(&self) -> ProbeState {
        self.probe.state()
    }

    fn is_available(&self) -> bool {
        self.install().is_some()
    }

    fn collect(&self) -> Vec<SourceRecord> {
        let Some(install) = self.install() else {
            return Vec::new();
        };
        match Self::read_installed(install) {
            Ok(manifests) => {
                tracing::debug!("Launcher B yielded {} records", manifests.len());
                manifests.into_iter().map(SourceRecord::LauncherB).collect()
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {}",
                    install.installed_file().display(),
                    e
                );
                Vec::new()
            }
        }
    }
}
