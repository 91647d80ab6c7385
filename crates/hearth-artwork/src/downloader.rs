//! Local image handling: file naming, boxart re-encoding, partial cleanup

use hearth_config::ArtKind;
use hearth_library::ArtworkLayout;
use image::ImageFormat;
use std::fs;
use std::path::Path;

use crate::ArtworkError;

/// File extension to store a downloaded image under, taken from the URL
/// path. Unknown or missing extensions fall back to `png`.
pub fn extension_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "jpg",
        Some("webp") => "webp",
        _ => "png",
    }
}

/// Re-encode `src` as JPEG at `dest` and delete `src`.
///
/// Does nothing when `src` already is `dest`.
pub fn normalize_boxart(src: &Path, dest: &Path) -> Result<(), ArtworkError> {
    if src == dest {
        return Ok(());
    }

    let decoded = image::open(src)?;
    // JPEG has no alpha channel
    let rgb = decoded.to_rgb8();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    rgb.save_with_format(dest, ImageFormat::Jpeg)?;
    fs::remove_file(src)?;

    tracing::debug!("Converted {} to {}", src.display(), dest.display());
    Ok(())
}

/// Remove `.partial` files left behind by interrupted downloads
pub fn cleanup_partials(layout: &ArtworkLayout) -> Result<usize, ArtworkError> {
    let mut removed = 0;
    for kind in ArtKind::ALL {
        let dir = layout.dir(kind);
        if !dir.exists() {
            continue;
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|e| e == "partial") {
                fs::remove_file(path)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extension_from_url() {
        assert_eq!(extension_from_url("https://cdn.example/grid/abc.PNG"), "png");
        assert_eq!(extension_from_url("https://cdn.example/a.jpeg?x=1"), "jpg");
        assert_eq!(extension_from_url("https://cdn.example/a.webp#frag"), "webp");
        assert_eq!(extension_from_url("https://cdn.example/noext"), "png");
    }

    #[test]
    fn test_normalize_boxart_reencodes_and_deletes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("440.png");
        let dest = dir.path().join("440.jpg");
        image::RgbaImage::from_pixel(4, 6, image::Rgba([200, 10, 10, 128]))
            .save(&src)
            .unwrap();

        normalize_boxart(&src, &dest).unwrap();

        assert!(!src.exists());
        let converted = image::open(&dest).unwrap();
        assert_eq!((converted.width(), converted.height()), (4, 6));
        assert_eq!(
            image::ImageFormat::from_path(&dest).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_normalize_boxart_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("bad.png");
        fs::write(&src, b"not an image").unwrap();
        assert!(normalize_boxart(&src, &dir.path().join("bad.jpg")).is_err());
    }

    #[test]
    fn test_cleanup_partials() {
        let dir = TempDir::new().unwrap();
        let layout = ArtworkLayout::new(dir.path());
        fs::create_dir_all(layout.dir(ArtKind::Hero)).unwrap();
        fs::write(layout.dir(ArtKind::Hero).join("1.partial"), b"x").unwrap();
        fs::write(layout.dir(ArtKind::Hero).join("2.png"), b"x").unwrap();

        assert_eq!(cleanup_partials(&layout).unwrap(), 1);
        assert!(layout.dir(ArtKind::Hero).join("2.png").exists());
    }
}
