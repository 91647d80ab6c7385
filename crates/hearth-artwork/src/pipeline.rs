//! Concurrent artwork resolution
//!
//! One task per title runs under a semaphore sized from the configuration.
//! Tasks only report what they found; the loop draining the [`JoinSet`] is
//! the single writer of the blacklist and the report.

use hearth_config::{ArtKind, ArtworkBlacklist, ArtworkConfig};
use hearth_library::{ArtworkLayout, Library};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::client::{ArtworkService, Lookup, TitleRef};
use crate::downloader::{cleanup_partials, extension_from_url, normalize_boxart};
use crate::retry::RetryPolicy;
use crate::ArtworkError;

/// Progress handed to the caller every `flush_every` finished titles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Titles with at least one kind to fetch
    pub total: usize,
    pub completed: usize,
    pub downloaded: usize,
    pub blacklisted: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    /// Get progress as percentage (0-100)
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            100
        } else {
            ((self.completed as f64 / self.total as f64) * 100.0) as u8
        }
    }
}

/// Result of one [`ArtworkPipeline::resolve`] run
#[derive(Debug, Default)]
pub struct ArtworkReport {
    pub downloaded: Vec<(String, ArtKind, PathBuf)>,
    pub newly_blacklisted: Vec<(String, ArtKind)>,
    /// Lookups that failed and will be tried again next run
    pub failed: Vec<(String, ArtKind, String)>,
    /// Titles the service could not identify
    pub unresolved: Vec<String>,
    /// Titles with nothing left to fetch
    pub skipped: usize,
}

struct TitleJob {
    app_id: String,
    title: TitleRef,
    /// Kinds to fetch, each with the candidate index to use
    kinds: Vec<(ArtKind, usize)>,
}

enum KindOutcome {
    Stored(PathBuf),
    Absent,
    Failed(String),
}

struct TitleOutcome {
    app_id: String,
    unresolved: bool,
    kinds: Vec<(ArtKind, KindOutcome)>,
}

struct Shared<S> {
    service: Arc<S>,
    layout: ArtworkLayout,
    retry: RetryPolicy,
    ids: Mutex<HashMap<TitleRef, u64>>,
}

pub struct ArtworkPipeline<S> {
    shared: Arc<Shared<S>>,
    config: ArtworkConfig,
}

impl<S: ArtworkService> ArtworkPipeline<S> {
    pub fn new(
        service: Arc<S>,
        layout: ArtworkLayout,
        config: ArtworkConfig,
    ) -> Self {
        let shared = Shared {
            service,
            layout,
            retry: RetryPolicy::from_config(&config),
            ids: Mutex::new(HashMap::new()),
        };
        Self {
            shared: Arc::new(shared),
            config,
        }
    }

    pub fn layout(&self) -> &ArtworkLayout {
        &self.shared.layout
    }

    /// Fetch every missing, non-blacklisted image for `library`.
    ///
    /// `progress` runs on the calling task with the running totals and the
    /// blacklist as it stands, every `flush_every` completions and once at
    /// the end.
    pub async fn resolve<F>(
        &self,
        library: &Library,
        blacklist: &mut ArtworkBlacklist,
        mut progress: F,
    ) -> ArtworkReport
    where
        F: FnMut(&ProgressSnapshot, &ArtworkBlacklist),
    {
        match cleanup_partials(&self.shared.layout) {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Removed {} partial downloads", n),
            Err(e) => tracing::warn!("Failed to clean partial downloads: {}", e),
        }

        let mut report = ArtworkReport::default();
        let jobs = self.plan(library, blacklist, &mut report);

        let workers = self.config.worker_count();
        let flush_every = self.config.flush_every.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut snapshot = ProgressSnapshot {
            total: jobs.len(),
            ..Default::default()
        };

        tracing::info!(
            "Resolving artwork for {} titles with {} workers ({} up to date)",
            jobs.len(),
            workers,
            report.skipped
        );

        let mut tasks = JoinSet::new();
        for job in jobs {
            let shared = Arc::clone(&self.shared);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let app_id = job.app_id.clone();
                match semaphore.acquire_owned().await {
                    Ok(_permit) => process_title(shared, job).await,
                    Err(e) => TitleOutcome {
                        app_id,
                        unresolved: false,
                        kinds: job
                            .kinds
                            .iter()
                            .map(|(kind, _)| (*kind, KindOutcome::Failed(e.to_string())))
                            .collect(),
                    },
                }
            });
        }

        let mut since_flush = 0;
        while let Some(joined) = tasks.join_next().await {
            snapshot.completed += 1;
            match joined {
                Ok(outcome) => apply_outcome(outcome, blacklist, &mut report, &mut snapshot),
                Err(e) => {
                    tracing::warn!("Artwork task failed: {}", e);
                    snapshot.failed += 1;
                }
            }

            since_flush += 1;
            if since_flush == flush_every {
                progress(&snapshot, blacklist);
                since_flush = 0;
            }
        }
        progress(&snapshot, blacklist);

        tracing::info!(
            "Artwork done: {} downloaded, {} blacklisted, {} failed, {} unresolved",
            report.downloaded.len(),
            report.newly_blacklisted.len(),
            report.failed.len(),
            report.unresolved.len()
        );
        report
    }

    /// Work left per title after on-disk and blacklist checks
    fn plan(
        &self,
        library: &Library,
        blacklist: &ArtworkBlacklist,
        report: &mut ArtworkReport,
    ) -> Vec<TitleJob> {
        let mut jobs = Vec::new();
        for record in library {
            let kinds: Vec<(ArtKind, usize)> = ArtKind::ALL
                .into_iter()
                .filter(|kind| !blacklist.contains(*kind, &record.app_id))
                .filter(|kind| self.shared.layout.existing(*kind, &record.app_id).is_none())
                .map(|kind| (kind, self.config.variant_index(&record.app_id, kind)))
                .collect();

            if kinds.is_empty() {
                report.skipped += 1;
                continue;
            }
            jobs.push(TitleJob {
                app_id: record.app_id.clone(),
                title: TitleRef::for_record(record),
                kinds,
            });
        }
        jobs
    }
}

fn apply_outcome(
    outcome: TitleOutcome,
    blacklist: &mut ArtworkBlacklist,
    report: &mut ArtworkReport,
    snapshot: &mut ProgressSnapshot,
) {
    if outcome.unresolved {
        report.unresolved.push(outcome.app_id.clone());
    }
    for (kind, result) in outcome.kinds {
        match result {
            KindOutcome::Stored(path) => {
                snapshot.downloaded += 1;
                report.downloaded.push((outcome.app_id.clone(), kind, path));
            }
            KindOutcome::Absent => {
                if blacklist.insert(kind, outcome.app_id.clone()) {
                    tracing::info!("No {} for {}, blacklisted", kind, outcome.app_id);
                    snapshot.blacklisted += 1;
                    report.newly_blacklisted.push((outcome.app_id.clone(), kind));
                }
            }
            KindOutcome::Failed(reason) => {
                snapshot.failed += 1;
                report.failed.push((outcome.app_id.clone(), kind, reason));
            }
        }
    }
}

async fn process_title<S: ArtworkService>(shared: Arc<Shared<S>>, job: TitleJob) -> TitleOutcome {
    let mut outcome = TitleOutcome {
        app_id: job.app_id.clone(),
        unresolved: false,
        kinds: Vec::with_capacity(job.kinds.len()),
    };

    let game_id = match resolve_game_id(&shared, &job.title).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            tracing::debug!("{:?} not known to the image service", job.title);
            outcome.unresolved = true;
            return outcome;
        }
        Err(e) => {
            tracing::warn!("Lookup of {} failed: {}", job.app_id, e);
            outcome.unresolved = true;
            return outcome;
        }
    };

    for (kind, variant) in job.kinds {
        let result = fetch_kind(&shared, game_id, &job.app_id, kind, variant).await;
        outcome.kinds.push((kind, result));
    }
    outcome
}

async fn resolve_game_id<S: ArtworkService>(
    shared: &Shared<S>,
    title: &TitleRef,
) -> Result<Option<u64>, ArtworkError> {
    if let Some(id) = shared.ids.lock().await.get(title) {
        return Ok(Some(*id));
    }

    let lookup = shared
        .retry
        .run("id lookup", || shared.service.resolve_id(title))
        .await?;
    match lookup {
        Lookup::Found(id) => {
            shared.ids.lock().await.insert(title.clone(), id);
            Ok(Some(id))
        }
        Lookup::Missing => Ok(None),
    }
}

async fn fetch_kind<S: ArtworkService>(
    shared: &Shared<S>,
    game_id: u64,
    app_id: &str,
    kind: ArtKind,
    variant: usize,
) -> KindOutcome {
    let lookup = shared
        .retry
        .run("asset lookup", || shared.service.asset_urls(game_id, kind))
        .await;
    let urls = match lookup {
        Ok(Lookup::Found(urls)) if !urls.is_empty() => urls,
        Ok(_) => return KindOutcome::Absent,
        Err(e) => {
            tracing::warn!("{} lookup for {} failed: {}", kind, app_id, e);
            return KindOutcome::Failed(e.to_string());
        }
    };

    // Fall back to the best candidate when no alternative exists
    let url = urls.get(variant).unwrap_or(&urls[0]);
    let extension = extension_from_url(url);
    let dest = shared.layout.path(kind, app_id, extension);

    if let Err(e) = shared
        .retry
        .run("download", || shared.service.download(url, &dest))
        .await
    {
        tracing::warn!("Downloading {} for {} failed: {}", kind, app_id, e);
        return KindOutcome::Failed(e.to_string());
    }

    if kind != ArtKind::Boxart {
        return KindOutcome::Stored(dest);
    }

    let jpeg = shared.layout.canonical_path(ArtKind::Boxart, app_id);
    let src = dest.clone();
    let target = jpeg.clone();
    match tokio::task::spawn_blocking(move || normalize_boxart(&src, &target)).await {
        Ok(Ok(())) => KindOutcome::Stored(jpeg),
        Ok(Err(e)) => {
            tracing::warn!("Converting boxart for {} failed: {}", app_id, e);
            if let Err(cleanup) = tokio::fs::remove_file(&dest).await {
                tracing::warn!("Failed to remove {}: {}", dest.display(), cleanup);
            }
            KindOutcome::Failed(e.to_string())
        }
        Err(e) => KindOutcome::Failed(ArtworkError::Task(e.to_string()).to_string()),
    }
}
