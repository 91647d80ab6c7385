//! User-added store shortcuts (`userdata/<user>/config/shortcuts.vdf`)

use std::path::{Path, PathBuf};

use super::lutris::{LutrisDb, LutrisGame, lutris_id_from_command};
use super::native::{StoreInstall, select_installs};
use super::{Collector, Probe, ProbeState};
use crate::LibraryError;
use crate::ids::{ExclusionList, is_unmanaged_runner};
use crate::keyvalue::{KvDict, binary};
use crate::record::{GameSource, PlatformVariant, ShortcutManifest, SourceRecord};

pub struct ShortcutCollector {
    candidates: Vec<StoreInstall>,
    exclusions: ExclusionList,
    lutris: Option<LutrisDb>,
    probe: Probe<Vec<(StoreInstall, Vec<(String, PathBuf)>)>>,
}

impl ShortcutCollector {
    pub fn new(exclusions: ExclusionList) -> Self {
        Self::with_candidates(StoreInstall::host_candidates(), exclusions)
            .with_lutris(LutrisDb::locate())
    }

    pub fn with_candidates(candidates: Vec<StoreInstall>, exclusions: ExclusionList) -> Self {
        Self {
            candidates,
            exclusions,
            lutris: None,
            probe: Probe::new(),
        }
    }

    pub fn with_lutris(mut self, lutris: Option<LutrisDb>) -> Self {
        self.lutris = lutris;
        self
    }

    fn shortcut_files(&self) -> &[(StoreInstall, Vec<(String, PathBuf)>)] {
        self.probe
            .get_or_probe(|| {
                let found: Vec<_> = select_installs(&self.candidates)
                    .into_iter()
                    .map(|install| {
                        let files = install.shortcut_files();
                        (install, files)
                    })
                    .filter(|(_, files)| !files.is_empty())
                    .collect();
                (!found.is_empty()).then_some(found)
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Decode one `shortcuts.vdf`. A decode failure rejects the whole file.
    fn read_file(
        &self,
        install: &StoreInstall,
        user_id: &str,
        path: &Path,
    ) -> Result<Vec<ShortcutManifest>, LibraryError> {
        let bytes = std::fs::read(path)?;
        let root = binary::decode(&bytes)?;
        let Some(shortcuts) = root.get_dict("shortcuts") else {
            return Err(LibraryError::InvalidRecord(format!(
                "{}: no shortcuts dictionary",
                path.display()
            )));
        };

        let grid_dir = path
            .parent()
            .map(|config| config.join("grid"))
            .unwrap_or_default();

        let mut manifests = Vec::new();
        for (slot, value) in shortcuts.iter() {
            let Some(entry) = value.as_dict() else {
                tracing::debug!("Shortcut slot {} is not a dictionary", slot);
                continue;
            };
            if let Some(manifest) = self.parse_slot(entry, install, user_id, &grid_dir) {
                manifests.push(manifest);
            }
        }
        Ok(manifests)
    }

    fn parse_slot(
        &self,
        entry: &KvDict,
        install: &StoreInstall,
        user_id: &str,
        grid_dir: &Path,
    ) -> Option<ShortcutManifest> {
        let name = entry.get_str("AppName").unwrap_or_default().trim();
        let target_exe = entry.get_str("Exe").unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        if self.exclusions.is_excluded(name) {
            tracing::debug!("Excluding shortcut {}", name);
            return None;
        }
        if is_unmanaged_runner(target_exe) {
            tracing::debug!("Skipping shortcut {} managed by an external runner", name);
            return None;
        }
        let Some(shortcut_id) = entry.get_ci("appid").and_then(|v| v.as_u32()) else {
            tracing::debug!("Shortcut {} has no appid", name);
            return None;
        };

        let launch_options = entry.get_str("LaunchOptions").unwrap_or_default();
        let lutris = self.lutris_game(launch_options);

        Some(ShortcutManifest {
            shortcut_id,
            name: name.to_string(),
            target_exe: target_exe.to_string(),
            start_dir: entry.get_str("StartDir").unwrap_or_default().to_string(),
            icon: entry.get_str("icon").unwrap_or_default().to_string(),
            launch_options: launch_options.to_string(),
            user_id: user_id.to_string(),
            grid_dir: grid_dir.to_path_buf(),
            store: install.context(),
            lutris,
        })
    }

    fn lutris_game(&self, launch_options: &str) -> Option<LutrisGame> {
        let id = lutris_id_from_command(launch_options)?;
        let db = self.lutris.as_ref()?;
        match db.lookup(id) {
            Ok(game) => game,
            Err(e) => {
                tracing::warn!("Lutris lookup for {} failed: {}", id, e);
                None
            }
        }
    }
}

impl Collector for ShortcutCollector {
    fn source(&self) -> GameSource {
        GameSource::Shortcut
    }

    fn discover_paths(&self) -> Vec<PathBuf> {
        self.candidates.iter().map(|c| c.userdata_dir()).collect()
    }

    fn probe_state(&self) -> ProbeState {
        self.probe.state()
    }

    fn is_available(&self) -> bool {
        !self.shortcut_files().is_empty()
    }

    fn installed_roots(&self) -> Vec<(PlatformVariant, PathBuf)> {
        self.shortcut_files()
            .iter()
            .map(|(install, _)| (install.variant, install.userdata_dir()))
            .collect()
    }

    fn collect(&self) -> Vec<SourceRecord> {
        let mut records = Vec::new();
        for (install, files) in self.shortcut_files() {
            for (user_id, path) in files {
                match self.read_file(install, user_id, path) {
                    Ok(manifests) => {
                        records.extend(manifests.into_iter().map(SourceRecord::Shortcut))
                    }
                    Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
                }
            }
        }
        tracing::debug!("Shortcuts yielded {} records", records.len());
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyvalue::KvValue;
    use crate::record::PlatformVariant;
    use std::fs;
    use tempfile::TempDir;

    fn slot(id: u32, name: &str, exe: &str) -> KvDict {
        KvDict::new()
            .with("appid", KvValue::Int32(id as i32))
            .with("AppName", name)
            .with("Exe", exe)
            .with("StartDir", "\"/opt\"")
            .with("LaunchOptions", "")
    }

    fn write_shortcuts(root: &Path, user: &str, slots: Vec<KvDict>) -> PathBuf {
        fs::create_dir_all(root.join("steamapps")).unwrap();
        fs::write(root.join("steamapps/libraryfolders.vdf"), "\"libraryfolders\"\n{\n}\n").unwrap();

        let mut shortcuts = KvDict::new();
        for (i, s) in slots.into_iter().enumerate() {
            shortcuts.insert(i.to_string(), s);
        }
        let file = KvDict::new().with("shortcuts", shortcuts);

        let config = root.join("userdata").join(user).join("config");
        fs::create_dir_all(&config).unwrap();
        let path = config.join("shortcuts.vdf");
        fs::write(&path, binary::encode(&file).unwrap()).unwrap();
        path
    }

    fn collector(root: &Path) -> ShortcutCollector {
        ShortcutCollector::with_candidates(
            vec![StoreInstall::new(root, "/usr/bin/steam", PlatformVariant::Native)],
            ExclusionList::default(),
        )
    }

    #[test]
    fn test_collect_shortcuts() {
        let dir = TempDir::new().unwrap();
        write_shortcuts(
            dir.path(),
            "1000",
            vec![
                slot(12345, "MyGame", "\"/opt/mygame\""),
                slot(1, "Proton 9.0", "proton"),
                slot(2, "Streamed", "/home/deck/moondeckrun"),
                slot(0x8000_0001, "HighBit", "/opt/high"),
            ],
        );

        let records = collector(dir.path()).collect();
        let ids: Vec<String> = records.iter().map(SourceRecord::app_id).collect();
        assert_eq!(
            ids,
            vec![
                "53021404823552".to_string(),
                ((0x8000_0001u64 << 32) | 0x0200_0000).to_string()
            ]
        );

        let SourceRecord::Shortcut(first) = &records[0] else {
            panic!("wrong variant");
        };
        assert_eq!(first.user_id, "1000");
        assert_eq!(first.grid_dir, dir.path().join("userdata/1000/config/grid"));
    }

    #[test]
    fn test_corrupt_file_rejected_whole() {
        let dir = TempDir::new().unwrap();
        let path = write_shortcuts(dir.path(), "1000", vec![slot(5, "Good", "/bin/good")]);
        let mut bytes = fs::read(&path).unwrap();
        // Replace the first slot's type tag with an unknown one.
        let pos = bytes.iter().position(|b| *b == b'0').unwrap() - 1;
        bytes[pos] = 0x0A;
        fs::write(&path, bytes).unwrap();

        let collector = collector(dir.path());
        assert!(collector.is_available());
        assert!(collector.collect().is_empty());
    }

    #[test]
    fn test_lutris_metadata_attached() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("pga.db");
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE games (id INTEGER PRIMARY KEY, slug TEXT, runner TEXT);
             INSERT INTO games VALUES (9, 'hollow-knight', 'wine');",
        )
        .unwrap();
        drop(conn);

        let store = dir.path().join("Steam");
        write_shortcuts(
            &store,
            "1000",
            vec![slot(77, "Hollow Knight", "/usr/bin/lutris")
                .with("LaunchOptions", "lutris:rungameid/9")],
        );

        let records = collector(&store)
            .with_lutris(Some(LutrisDb::at(&db_path)))
            .collect();
        let SourceRecord::Shortcut(manifest) = &records[0] else {
            panic!("wrong variant");
        };
        let lutris = manifest.lutris.as_ref().unwrap();
        assert_eq!(lutris.slug, "hollow-knight");
        assert_eq!(lutris.runner.as_deref(), Some("wine"));
    }

    #[test]
    fn test_no_userdata_unavailable() {
        let dir = TempDir::new().unwrap();
        let collector = collector(dir.path());
        assert!(!collector.is_available());
        assert_eq!(collector.probe_state(), ProbeState::Unavailable);
    }
}
