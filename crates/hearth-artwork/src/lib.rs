//! Artwork resolution for the Hearth game library
//!
//! Looks up boxart, hero and logo images for every library record on a
//! SteamGridDB-compatible service and stores them under an
//! [`ArtworkLayout`].
//!
//! # Behaviour
//!
//! - A kind already on disk or blacklisted for a title costs no request
//! - A confirmed missing asset is blacklisted until the blacklist is reset
//! - Network failures are retried with exponential backoff and never
//!   blacklist anything
//! - Boxart is re-encoded to JPEG; hero and logo keep the served format

mod client;
mod downloader;
mod pipeline;
mod retry;

use thiserror::Error;

pub use client::{ArtworkService, GridClient, Lookup, TitleRef};
pub use downloader::{cleanup_partials, extension_from_url, normalize_boxart};
pub use hearth_config::ArtKind;
pub use hearth_library::ArtworkLayout;
pub use pipeline::{ArtworkPipeline, ArtworkReport, ProgressSnapshot};
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ArtworkError {
    /// Failures worth retrying. None of these ever blacklist a title.
    pub fn is_transient(&self) -> bool {
        match self {
            ArtworkError::Network(_) | ArtworkError::DownloadFailed(_) | ArtworkError::Http(_) => {
                true
            }
            ArtworkError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
