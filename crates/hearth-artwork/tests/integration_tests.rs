//! Integration tests for artwork resolution against an in-process service

use hearth_artwork::{
    ArtKind, ArtworkError, ArtworkLayout, ArtworkPipeline, ArtworkService, Lookup, TitleRef,
};
use hearth_config::{ArtworkBlacklist, ArtworkConfig, HearthConfig};
use hearth_library::{GameRecord, GameSource, Library};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Service with a fixed catalogue: title key -> (game id, kinds it has)
struct CatalogueService {
    games: HashMap<String, (u64, Vec<ArtKind>)>,
    /// Extension served per kind
    formats: HashMap<ArtKind, &'static str>,
    requests: AtomicUsize,
}

impl CatalogueService {
    fn new() -> Self {
        Self {
            games: HashMap::new(),
            formats: HashMap::new(),
            requests: AtomicUsize::new(0),
        }
    }

    fn game(mut self, key: &str, id: u64, kinds: &[ArtKind]) -> Self {
        self.games.insert(key.to_string(), (id, kinds.to_vec()));
        self
    }

    fn serve(mut self, kind: ArtKind, ext: &'static str) -> Self {
        self.formats.insert(kind, ext);
        self
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ArtworkService for CatalogueService {
    async fn resolve_id(&self, title: &TitleRef) -> Result<Lookup<u64>, ArtworkError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let key = match title {
            TitleRef::Platform { id, .. } => id,
            TitleRef::Search(name) => name,
        };
        Ok(match self.games.get(key) {
            Some((id, _)) => Lookup::Found(*id),
            None => Lookup::Missing,
        })
    }

    async fn asset_urls(
        &self,
        game_id: u64,
        kind: ArtKind,
    ) -> Result<Lookup<Vec<String>>, ArtworkError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let has = self
            .games
            .values()
            .any(|(id, kinds)| *id == game_id && kinds.contains(&kind));
        if !has {
            return Ok(Lookup::Missing);
        }
        let ext = self.formats.get(&kind).copied().unwrap_or("png");
        Ok(Lookup::Found(vec![format!(
            "https://cdn.test/{kind}/{game_id}.{ext}"
        )]))
    }

    async fn download(&self, _url: &str, dest: &Path) -> Result<(), ArtworkError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(dest.parent().unwrap())?;
        let format = image::ImageFormat::from_path(dest)?;
        image::RgbImage::from_pixel(8, 12, image::Rgb([40, 80, 120]))
            .save_with_format(dest, format)?;
        Ok(())
    }
}

/// Data directory with an artwork tree and a config file
struct ArtworkTestEnv {
    #[allow(dead_code)]
    temp_dir: TempDir,
    config_path: PathBuf,
    layout: ArtworkLayout,
}

impl ArtworkTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("config").join("hearth.toml");
        let layout = ArtworkLayout::new(temp_dir.path().join("artwork"));
        Self {
            temp_dir,
            config_path,
            layout,
        }
    }

    fn artwork_config(&self, flush_every: usize) -> ArtworkConfig {
        ArtworkConfig {
            cores: 1,
            workers_per_core: 3,
            flush_every,
            retry_base_ms: 0,
            ..Default::default()
        }
    }

    fn pipeline(
        &self,
        service: Arc<CatalogueService>,
        flush_every: usize,
    ) -> ArtworkPipeline<CatalogueService> {
        ArtworkPipeline::new(service, self.layout.clone(), self.artwork_config(flush_every))
    }
}

fn library() -> Library {
    [
        GameRecord::new("440", "Team Fortress 2", GameSource::NativeCatalog),
        GameRecord::new("53021404823552", "MyGame", GameSource::Shortcut),
        GameRecord::new("Fortnite", "Fortnite", GameSource::LauncherA),
    ]
    .into_iter()
    .collect()
}

#[tokio::test]
async fn test_blacklist_persists_across_runs() {
    let env = ArtworkTestEnv::new();
    let service = Arc::new(
        CatalogueService::new()
            .game("440", 1, &ArtKind::ALL)
            .game("MyGame", 2, &[ArtKind::Boxart, ArtKind::Hero])
            .game("Fortnite", 3, &[ArtKind::Boxart]),
    );

    let mut config = HearthConfig::default();
    let mut blacklist = config.blacklist.clone();
    let report = env
        .pipeline(service.clone(), 1)
        .resolve(&library(), &mut blacklist, |_, current| {
            let mut snapshot = HearthConfig::default();
            snapshot.blacklist = current.clone();
            snapshot.save(&env.config_path).unwrap();
        })
        .await;

    assert_eq!(report.downloaded.len(), 6);
    assert_eq!(report.newly_blacklisted.len(), 3);
    config.blacklist = blacklist;

    // What the last flush wrote is what the run ended with
    let reloaded = HearthConfig::load(&env.config_path).unwrap();
    assert_eq!(reloaded.blacklist, config.blacklist);
    assert!(reloaded.blacklist.contains(ArtKind::Logo, "53021404823552"));
    assert!(reloaded.blacklist.contains(ArtKind::Hero, "Fortnite"));
    assert!(reloaded.blacklist.contains(ArtKind::Logo, "Fortnite"));

    // A fresh pipeline with the reloaded blacklist has nothing to ask for
    let requests = service.requests();
    let mut blacklist = reloaded.blacklist;
    let second = env
        .pipeline(service.clone(), 1)
        .resolve(&library(), &mut blacklist, |_, _| {})
        .await;
    assert_eq!(second.skipped, 3);
    assert_eq!(service.requests(), requests);
}

#[tokio::test]
async fn test_reset_blacklist_allows_retry() {
    let env = ArtworkTestEnv::new();
    let mut blacklist = ArtworkBlacklist::default();
    blacklist.insert(ArtKind::Hero, "440");
    blacklist.insert(ArtKind::Logo, "440");

    let service = Arc::new(CatalogueService::new().game("440", 1, &ArtKind::ALL));
    let only_tf2: Library = [GameRecord::new("440", "Team Fortress 2", GameSource::NativeCatalog)]
        .into_iter()
        .collect();

    let report = env
        .pipeline(service.clone(), 1)
        .resolve(&only_tf2, &mut blacklist, |_, _| {})
        .await;
    assert_eq!(report.downloaded.len(), 1);
    assert!(env.layout.existing(ArtKind::Hero, "440").is_none());

    blacklist.reset(Some(ArtKind::Hero));
    let report = env
        .pipeline(service, 1)
        .resolve(&only_tf2, &mut blacklist, |_, _| {})
        .await;
    assert_eq!(report.downloaded.len(), 1);
    assert!(env.layout.existing(ArtKind::Hero, "440").is_some());
    assert!(blacklist.contains(ArtKind::Logo, "440"));
}

#[tokio::test]
async fn test_served_formats_and_layout_lookup() {
    let env = ArtworkTestEnv::new();
    let service = Arc::new(
        CatalogueService::new()
            .game("Fortnite", 3, &ArtKind::ALL)
            .serve(ArtKind::Boxart, "png")
            .serve(ArtKind::Hero, "jpg"),
    );
    let mut blacklist = ArtworkBlacklist::default();

    env.pipeline(service, 1)
        .resolve(&library(), &mut blacklist, |_, _| {})
        .await;

    // Boxart is re-encoded, hero keeps the served format
    let boxart = env.layout.existing(ArtKind::Boxart, "Fortnite").unwrap();
    assert_eq!(boxart, env.layout.canonical_path(ArtKind::Boxart, "Fortnite"));
    assert!(!env.layout.path(ArtKind::Boxart, "Fortnite", "png").exists());
    let hero = env.layout.existing(ArtKind::Hero, "Fortnite").unwrap();
    assert_eq!(hero.extension().unwrap(), "jpg");

    let mut record = GameRecord::new("Fortnite", "Fortnite", GameSource::LauncherA);
    env.layout.fill_missing(&mut record);
    assert_eq!(record.hero_path, hero.to_string_lossy());
    assert_eq!(record.boxart_path, boxart.to_string_lossy());
}

#[tokio::test]
async fn test_progress_flush_cadence() {
    let env = ArtworkTestEnv::new();
    let mut service = CatalogueService::new();
    let mut library = Library::new();
    for n in 0..5u64 {
        let id = format!("{}", 100 + n);
        service = service.game(&id, n + 1, &ArtKind::ALL);
        library.insert(GameRecord::new(id, format!("Game {n}"), GameSource::NativeCatalog));
    }
    let mut blacklist = ArtworkBlacklist::default();

    let mut seen = Vec::new();
    let report = env
        .pipeline(Arc::new(service), 2)
        .resolve(&library, &mut blacklist, |progress, _| seen.push(progress.completed))
        .await;

    assert_eq!(report.downloaded.len(), 15);
    assert_eq!(seen, vec![2, 4, 5]);
}
