//! Canonical game records and their per-source pre-images

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::LibraryError;
use crate::ids::shortcut_canonical_id;
use crate::sources::lutris::LutrisGame;

/// Where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameSource {
    /// Store catalog manifest
    NativeCatalog,
    /// User-added store shortcut
    Shortcut,
    /// Launcher A JSON manifest
    LauncherA,
    /// Launcher B installed-games database
    LauncherB,
}

impl GameSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameSource::NativeCatalog => "native-catalog",
            GameSource::Shortcut => "shortcut",
            GameSource::LauncherA => "launcher-a",
            GameSource::LauncherB => "launcher-b",
        }
    }
}

impl fmt::Display for GameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameSource {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native-catalog" => Ok(GameSource::NativeCatalog),
            "shortcut" => Ok(GameSource::Shortcut),
            "launcher-a" => Ok(GameSource::LauncherA),
            "launcher-b" => Ok(GameSource::LauncherB),
            other => Err(LibraryError::InvalidRecord(format!("unknown source {other}"))),
        }
    }
}

/// Whether a title runs directly or through a translation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformVariant {
    #[default]
    Native,
    CompatibilityLayer,
}

impl PlatformVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformVariant::Native => "native",
            PlatformVariant::CompatibilityLayer => "compatibility-layer",
        }
    }
}

impl FromStr for PlatformVariant {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(PlatformVariant::Native),
            "compatibility-layer" => Ok(PlatformVariant::CompatibilityLayer),
            other => Err(LibraryError::InvalidRecord(format!(
                "unknown platform variant {other}"
            ))),
        }
    }
}

/// A canonical library entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub app_id: String,
    pub name: String,
    pub executable_path: String,
    pub launch_arguments: String,
    pub install_dir: Option<String>,
    pub source: GameSource,
    pub platform_variant: PlatformVariant,
    pub icon_path: String,
    pub hero_path: String,
    pub logo_path: String,
    pub boxart_path: String,
    /// Source-specific fields with no fixed column
    #[serde(default)]
    pub extension_metadata: Map<String, Value>,
}

impl GameRecord {
    /// Bare record with empty paths
    pub fn new(app_id: impl Into<String>, name: impl Into<String>, source: GameSource) -> Self {
        Self {
            app_id: app_id.into(),
            name: name.into(),
            executable_path: String::new(),
            launch_arguments: String::new(),
            install_dir: None,
            source,
            platform_variant: PlatformVariant::Native,
            icon_path: String::new(),
            hero_path: String::new(),
            logo_path: String::new(),
            boxart_path: String::new(),
            extension_metadata: Map::new(),
        }
    }

    fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extension_metadata.insert(key.to_string(), value.into());
        self
    }
}

/// How the store client that owns a record is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreContext {
    pub launch_path: String,
    pub variant: PlatformVariant,
}

/// One `appmanifest_*.acf`
#[derive(Debug, Clone)]
pub struct CatalogManifest {
    pub app_id: String,
    pub name: String,
    pub install_dir: Option<String>,
    pub library_root: PathBuf,
    pub library_cache: PathBuf,
    pub size_on_disk: Option<u64>,
    pub build_id: Option<String>,
    pub store: StoreContext,
}

/// One numbered slot of `shortcuts.vdf`
#[derive(Debug, Clone)]
pub struct ShortcutManifest {
    pub shortcut_id: u32,
    pub name: String,
    pub target_exe: String,
    pub start_dir: String,
    pub icon: String,
    pub launch_options: String,
    pub user_id: String,
    pub grid_dir: PathBuf,
    pub store: StoreContext,
    pub lutris: Option<LutrisGame>,
}

impl ShortcutManifest {
    pub fn app_id(&self) -> String {
        shortcut_canonical_id(self.shortcut_id).to_string()
    }
}

/// One launcher A `*.item` manifest
#[derive(Debug, Clone)]
pub struct LauncherAManifest {
    pub app_name: String,
    pub display_name: String,
    pub install_location: String,
    pub launch_executable: String,
    pub catalog_namespace: Option<String>,
    pub catalog_item_id: Option<String>,
}

/// One entry of launcher B's `installed.json`
#[derive(Debug, Clone)]
pub struct LauncherBManifest {
    pub app_name: String,
    pub title: String,
    pub install_path: String,
    pub executable: String,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub launch_command: String,
    pub variant: PlatformVariant,
}

/// A raw collector result, before normalization
#[derive(Debug, Clone)]
pub enum SourceRecord {
    NativeCatalog(CatalogManifest),
    Shortcut(ShortcutManifest),
    LauncherA(LauncherAManifest),
    LauncherB(LauncherBManifest),
}

impl SourceRecord {
    pub fn source(&self) -> GameSource {
        match self {
            SourceRecord::NativeCatalog(_) => GameSource::NativeCatalog,
            SourceRecord::Shortcut(_) => GameSource::Shortcut,
            SourceRecord::LauncherA(_) => GameSource::LauncherA,
            SourceRecord::LauncherB(_) => GameSource::LauncherB,
        }
    }

    pub fn app_id(&self) -> String {
        match self {
            SourceRecord::NativeCatalog(m) => m.app_id.clone(),
            SourceRecord::Shortcut(m) => m.app_id(),
            SourceRecord::LauncherA(m) => m.app_name.clone(),
            SourceRecord::LauncherB(m) => m.app_name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SourceRecord::NativeCatalog(m) => &m.name,
            SourceRecord::Shortcut(m) => &m.name,
            SourceRecord::LauncherA(m) => &m.display_name,
            SourceRecord::LauncherB(m) => &m.title,
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn store_launch_url(app_id: &str) -> String {
    format!("steam://rungameid/{app_id}")
}

fn from_catalog(m: CatalogManifest) -> GameRecord {
    let cache = &m.library_cache;
    let mut record = GameRecord {
        launch_arguments: store_launch_url(&m.app_id),
        executable_path: m.store.launch_path.clone(),
        install_dir: m
            .install_dir
            .as_ref()
            .map(|dir| path_string(&m.library_root.join("common").join(dir))),
        platform_variant: m.store.variant,
        icon_path: path_string(&cache.join(format!("{}_icon.jpg", m.app_id))),
        hero_path: path_string(&cache.join(&m.app_id).join("library_hero.jpg")),
        logo_path: path_string(&cache.join(&m.app_id).join("logo.png")),
        boxart_path: path_string(&cache.join(&m.app_id).join("library_600x900.jpg")),
        ..GameRecord::new(&m.app_id, &m.name, GameSource::NativeCatalog)
    }
    .with_meta("library_root", path_string(&m.library_root));

    if let Some(size) = m.size_on_disk {
        record = record.with_meta("size_on_disk", size);
    }
    if let Some(build) = m.build_id {
        record = record.with_meta("build_id", build);
    }
    record
}

fn from_shortcut(m: ShortcutManifest) -> GameRecord {
    let app_id = m.app_id();
    let start_dir = m.start_dir.trim_matches('"').to_string();
    let mut record = GameRecord {
        executable_path: m.store.launch_path.clone(),
        launch_arguments: store_launch_url(&app_id),
        install_dir: (!start_dir.is_empty()).then(|| start_dir.clone()),
        platform_variant: m.store.variant,
        icon_path: m.icon.clone(),
        hero_path: path_string(&m.grid_dir.join(format!("{app_id}_hero.jpg"))),
        logo_path: path_string(&m.grid_dir.join(format!("{app_id}_logo.png"))),
        boxart_path: path_string(&m.grid_dir.join(format!("{app_id}p.jpg"))),
        ..GameRecord::new(&app_id, &m.name, GameSource::Shortcut)
    }
    .with_meta("shortcut_id", m.shortcut_id)
    .with_meta("user_id", m.user_id)
    .with_meta("target_exe", m.target_exe)
    .with_meta("start_dir", start_dir);

    if !m.launch_options.is_empty() {
        record = record.with_meta("launch_options", m.launch_options);
    }
    if let Some(lutris) = m.lutris {
        record = record
            .with_meta("lutris_id", lutris.id)
            .with_meta("lutris_slug", lutris.slug);
        if let Some(runner) = lutris.runner {
            record = record.with_meta("lutris_runner", runner);
        }
    }
    record
}

fn from_launcher_a(m: LauncherAManifest) -> GameRecord {
    let executable = Path::new(&m.install_location).join(&m.launch_executable);
    let mut record = GameRecord {
        executable_path: path_string(&executable),
        install_dir: Some(m.install_location.clone()),
        ..GameRecord::new(&m.app_name, &m.display_name, GameSource::LauncherA)
    };
    if let Some(ns) = m.catalog_namespace {
        record = record.with_meta("catalog_namespace", ns);
    }
    if let Some(item) = m.catalog_item_id {
        record = record.with_meta("catalog_item_id", item);
    }
    record
}

fn from_launcher_b(m: LauncherBManifest) -> GameRecord {
    let target = Path::new(&m.install_path).join(&m.executable);
    let mut record = GameRecord {
        executable_path: m.launch_command.clone(),
        launch_arguments: format!(
            "--no-gui --no-sandbox \"heroic://launch/legendary/{}\"",
            m.app_name
        ),
        install_dir: Some(m.install_path.clone()),
        platform_variant: m.variant,
        ..GameRecord::new(&m.app_name, &m.title, GameSource::LauncherB)
    }
    .with_meta("target_exe", path_string(&target));

    if let Some(platform) = m.platform {
        record = record.with_meta("platform", platform);
    }
    if let Some(version) = m.version {
        record = record.with_meta("version", version);
    }
    record
}

impl From<SourceRecord> for GameRecord {
    fn from(record: SourceRecord) -> Self {
        match record {
            SourceRecord::NativeCatalog(m) => from_catalog(m),
            SourceRecord::Shortcut(m) => from_shortcut(m),
            SourceRecord::LauncherA(m) => from_launcher_a(m),
            SourceRecord::LauncherB(m) => from_launcher_b(m),
        }
    }
}
