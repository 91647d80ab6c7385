//! Image service client

use futures_util::StreamExt;
use hearth_config::{ArtKind, ArtworkConfig};
use hearth_library::{GameRecord, GameSource};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::ArtworkError;

/// Answer of a lookup that reached the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    /// The service confirmed there is nothing to return
    Missing,
}

/// How a title is identified to the service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TitleRef {
    /// A platform-native id the service indexes directly
    Platform { platform: &'static str, id: String },
    /// Free-text search by title
    Search(String),
}

impl TitleRef {
    /// Store titles are looked up by their store id; shortcuts have no id
    /// the service knows, so they are searched by name.
    pub fn for_record(record: &GameRecord) -> Self {
        let platform = match record.source {
            GameSource::NativeCatalog => "steam",
            // Both launchers install titles from the same store catalog
            GameSource::LauncherA | GameSource::LauncherB => "egs",
            GameSource::Shortcut => return TitleRef::Search(record.name.clone()),
        };
        TitleRef::Platform {
            platform,
            id: record.app_id.clone(),
        }
    }
}

/// Remote artwork lookups
pub trait ArtworkService: Send + Sync + 'static {
    /// Resolve the service's own id for a title
    fn resolve_id(
        &self,
        title: &TitleRef,
    ) -> impl Future<Output = Result<Lookup<u64>, ArtworkError>> + Send;

    /// Candidate image URLs for one kind, best first
    fn asset_urls(
        &self,
        game_id: u64,
        kind: ArtKind,
    ) -> impl Future<Output = Result<Lookup<Vec<String>>, ArtworkError>> + Send;

    /// Store the image at `url` as `dest`
    fn download(
        &self,
        url: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), ArtworkError>> + Send;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

#[derive(Debug, PartialEq, Deserialize)]
struct GameData {
    id: u64,
}

#[derive(Debug, PartialEq, Deserialize)]
struct AssetData {
    url: String,
}

/// Interpret a service response body.
///
/// `success: false` or an empty payload on a 200 or 404 is a confirmed
/// absence. Anything else that is not a well-formed success is an error.
pub(crate) fn parse_envelope<T: DeserializeOwned>(
    status: StatusCode,
    url: &str,
    body: &str,
) -> Result<Lookup<T>, ArtworkError> {
    let status_error = || ArtworkError::Status {
        status: status.as_u16(),
        url: url.to_string(),
    };

    if status != StatusCode::OK && status != StatusCode::NOT_FOUND {
        return Err(status_error());
    }

    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(Envelope {
            success: true,
            data: Some(data),
        }) => Ok(Lookup::Found(data)),
        Ok(_) => Ok(Lookup::Missing),
        Err(_) if status == StatusCode::NOT_FOUND => Err(status_error()),
        Err(e) => Err(ArtworkError::InvalidResponse(format!("{url}: {e}"))),
    }
}

/// SteamGridDB-compatible HTTP client
pub struct GridClient {
    base: Url,
    client: reqwest::Client,
}

impl GridClient {
    pub fn new(config: &ArtworkConfig) -> Result<Self, ArtworkError> {
        let base = Url::parse(&config.api_url)
            .map_err(|e| ArtworkError::Config(format!("api_url {}: {}", config.api_url, e)))?;

        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| ArtworkError::Config(format!("api_key: {}", e)))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(format!("Hearth/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self { base, client })
    }

    /// `base` with `segments` appended, each percent-encoded
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ArtworkError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ArtworkError::Config(format!("api_url {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn asset_endpoint(&self, game_id: u64, kind: ArtKind) -> Result<Url, ArtworkError> {
        let id = game_id.to_string();
        let (collection, filter) = match kind {
            ArtKind::Boxart => ("grids", ("dimensions", "512x512,1024x1024")),
            ArtKind::Hero => ("heroes", ("mimes", "image/png")),
            ArtKind::Logo => ("logos", ("mimes", "image/png")),
        };
        let mut url = self.endpoint(&[collection, "game", id.as_str()])?;
        url.query_pairs_mut().append_pair(filter.0, filter.1);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<Lookup<T>, ArtworkError> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;
        parse_envelope(status, url.as_str(), &body)
    }
}

impl ArtworkService for GridClient {
    async fn resolve_id(&self, title: &TitleRef) -> Result<Lookup<u64>, ArtworkError> {
        match title {
            TitleRef::Platform { platform, id } => {
                let url = self.endpoint(&["games", *platform, id.as_str()])?;
                Ok(match self.fetch::<GameData>(url).await? {
                    Lookup::Found(game) => Lookup::Found(game.id),
                    Lookup::Missing => Lookup::Missing,
                })
            }
            TitleRef::Search(term) => {
                let url = self.endpoint(&["search", "autocomplete", term.as_str()])?;
                Ok(match self.fetch::<Vec<GameData>>(url).await? {
                    Lookup::Found(games) => match games.first() {
                        Some(game) => Lookup::Found(game.id),
                        None => Lookup::Missing,
                    },
                    Lookup::Missing => Lookup::Missing,
                })
            }
        }
    }

    async fn asset_urls(
        &self,
        game_id: u64,
        kind: ArtKind,
    ) -> Result<Lookup<Vec<String>>, ArtworkError> {
        let url = self.asset_endpoint(game_id, kind)?;
        Ok(match self.fetch::<Vec<AssetData>>(url).await? {
            Lookup::Found(assets) if !assets.is_empty() => {
                Lookup::Found(assets.into_iter().map(|a| a.url).collect())
            }
            _ => Lookup::Missing,
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), ArtworkError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ArtworkError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let partial = dest.with_extension("partial");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                        tracing::warn!("Failed to remove {}: {}", partial.display(), cleanup);
                    }
                    return Err(ArtworkError::DownloadFailed(format!("{url}: {e}")));
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, dest).await?;
        tracing::debug!("Saved {} bytes to {}", written, dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GridClient {
        GridClient::new(&ArtworkConfig {
            api_key: "secret".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_title_ref_for_record() {
        let native = GameRecord::new("440", "Team Fortress 2", GameSource::NativeCatalog);
        assert_eq!(
            TitleRef::for_record(&native),
            TitleRef::Platform {
                platform: "steam",
                id: "440".to_string()
            }
        );
        let shortcut = GameRecord::new("53021404823552", "MyGame", GameSource::Shortcut);
        assert_eq!(
            TitleRef::for_record(&shortcut),
            TitleRef::Search("MyGame".to_string())
        );
        for source in [GameSource::LauncherA, GameSource::LauncherB] {
            let launcher = GameRecord::new("Sugar", "Rocket League", source);
            assert_eq!(
                TitleRef::for_record(&launcher),
                TitleRef::Platform {
                    platform: "egs",
                    id: "Sugar".to_string()
                }
            );
        }
    }

    #[test]
    fn test_endpoints() {
        let client = client();
        assert_eq!(
            client.endpoint(&["games", "steam", "440"]).unwrap().as_str(),
            "https://www.steamgriddb.com/api/v2/games/steam/440"
        );
        assert_eq!(
            client
                .endpoint(&["search", "autocomplete", "Half Life/2"])
                .unwrap()
                .as_str(),
            "https://www.steamgriddb.com/api/v2/search/autocomplete/Half%20Life%2F2"
        );
        assert_eq!(
            client.asset_endpoint(7, ArtKind::Boxart).unwrap().as_str(),
            "https://www.steamgriddb.com/api/v2/grids/game/7?dimensions=512x512%2C1024x1024"
        );
        assert_eq!(
            client.asset_endpoint(7, ArtKind::Logo).unwrap().as_str(),
            "https://www.steamgriddb.com/api/v2/logos/game/7?mimes=image%2Fpng"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = GridClient::new(&ArtworkConfig {
            api_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ArtworkError::Config(_))));
    }

    #[test]
    fn test_parse_envelope_found() {
        let lookup: Lookup<GameData> = parse_envelope(
            StatusCode::OK,
            "u",
            r#"{"success":true,"data":{"id":5,"name":"x"}}"#,
        )
        .unwrap();
        assert!(matches!(lookup, Lookup::Found(GameData { id: 5 })));
    }

    #[test]
    fn test_parse_envelope_confirmed_absence() {
        let missing: Lookup<GameData> = parse_envelope(
            StatusCode::NOT_FOUND,
            "u",
            r#"{"success":false,"errors":["Game not found"]}"#,
        )
        .unwrap();
        assert_eq!(missing, Lookup::Missing);

        let empty: Lookup<Vec<AssetData>> =
            parse_envelope(StatusCode::OK, "u", r#"{"success":true,"data":[]}"#).unwrap();
        assert!(matches!(empty, Lookup::Found(ref v) if v.is_empty()));
    }

    #[test]
    fn test_parse_envelope_errors() {
        let unauthorized = parse_envelope::<GameData>(
            StatusCode::UNAUTHORIZED,
            "u",
            r#"{"success":false}"#,
        );
        assert!(matches!(
            unauthorized,
            Err(ArtworkError::Status { status: 401, .. })
        ));

        let server = parse_envelope::<GameData>(StatusCode::BAD_GATEWAY, "u", "");
        assert!(server.unwrap_err().is_transient());

        let garbage = parse_envelope::<GameData>(StatusCode::OK, "u", "<html>");
        assert!(matches!(garbage, Err(ArtworkError::InvalidResponse(_))));
    }
}
