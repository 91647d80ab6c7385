//! On-disk layout of downloaded artwork

use hearth_config::ArtKind;
use std::path::{Path, PathBuf};

use crate::record::{GameRecord, GameSource};

/// Extensions searched when looking for an already downloaded hero or logo
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Artwork directory tree rooted at `root`:
///
/// ```text
/// root/thumbnails/<app_id>.jpg
/// root/hero/<app_id>.<ext>
/// root/logo/<app_id>.<ext>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkLayout {
    root: PathBuf,
}

impl ArtworkLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: ArtKind) -> PathBuf {
        self.root.join(match kind {
            ArtKind::Boxart => "thumbnails",
            ArtKind::Hero => "hero",
            ArtKind::Logo => "logo",
        })
    }

    pub fn path(&self, kind: ArtKind, app_id: &str, extension: &str) -> PathBuf {
        self.dir(kind).join(format!("{app_id}.{extension}"))
    }

    /// Path a freshly stored image is expected at. Boxart is always JPEG.
    pub fn canonical_path(&self, kind: ArtKind, app_id: &str) -> PathBuf {
        let extension = match kind {
            ArtKind::Boxart => "jpg",
            ArtKind::Hero | ArtKind::Logo => "png",
        };
        self.path(kind, app_id, extension)
    }

    /// An already downloaded image for `app_id`, if any
    pub fn existing(&self, kind: ArtKind, app_id: &str) -> Option<PathBuf> {
        let extensions: &[&str] = match kind {
            ArtKind::Boxart => &["jpg"],
            ArtKind::Hero | ArtKind::Logo => IMAGE_EXTENSIONS,
        };
        extensions
            .iter()
            .map(|ext| self.path(kind, app_id, ext))
            .find(|path| path.is_file())
    }

    /// Point launcher records, which ship no artwork of their own, at this
    /// layout. Paths the collector already set are kept.
    pub fn fill_missing(&self, record: &mut GameRecord) {
        if !matches!(record.source, GameSource::LauncherA | GameSource::LauncherB) {
            return;
        }
        for kind in ArtKind::ALL {
            let slot = match kind {
                ArtKind::Boxart => &mut record.boxart_path,
                ArtKind::Hero => &mut record.hero_path,
                ArtKind::Logo => &mut record.logo_path,
            };
            if slot.is_empty() {
                let path = self
                    .existing(kind, &record.app_id)
                    .unwrap_or_else(|| self.canonical_path(kind, &record.app_id));
                *slot = path.to_string_lossy().into_owned();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = ArtworkLayout::new("/data/art");
        assert_eq!(
            layout.canonical_path(ArtKind::Boxart, "440"),
            PathBuf::from("/data/art/thumbnails/440.jpg")
        );
        assert_eq!(
            layout.path(ArtKind::Logo, "440", "webp"),
            PathBuf::from("/data/art/logo/440.webp")
        );
    }

    #[test]
    fn test_existing_prefers_downloaded_extension() {
        let dir = TempDir::new().unwrap();
        let layout = ArtworkLayout::new(dir.path());
        std::fs::create_dir_all(layout.dir(ArtKind::Hero)).unwrap();
        std::fs::write(layout.path(ArtKind::Hero, "7", "webp"), b"x").unwrap();

        assert_eq!(
            layout.existing(ArtKind::Hero, "7"),
            Some(layout.path(ArtKind::Hero, "7", "webp"))
        );
        assert!(layout.existing(ArtKind::Boxart, "7").is_none());
    }

    #[test]
    fn test_fill_missing_only_touches_launchers() {
        let layout = ArtworkLayout::new("/art");

        let mut launcher = GameRecord::new("Sugar", "Rocket League", GameSource::LauncherA);
        launcher.logo_path = "/custom/logo.png".to_string();
        layout.fill_missing(&mut launcher);
        assert_eq!(launcher.boxart_path, "/art/thumbnails/Sugar.jpg");
        assert_eq!(launcher.hero_path, "/art/hero/Sugar.png");
        assert_eq!(launcher.logo_path, "/custom/logo.png");

        let mut native = GameRecord::new("440", "Team Fortress 2", GameSource::NativeCatalog);
        layout.fill_missing(&mut native);
        assert!(native.boxart_path.is_empty());
    }
}
