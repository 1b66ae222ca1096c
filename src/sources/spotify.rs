use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use std::{
    sync::LazyLock,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::{CatalogLink, MediaKind, MediaProvider, ProviderKind, TrackMetadata};
use crate::error::{MusicError, Result};

static WEB_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:open|play)\.spotify\.com/(?:intl-[A-Za-z-]+/)?(track|album|playlist|artist)/([A-Za-z0-9]{22})")
        .expect("regex de Spotify válida")
});

static URI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^spotify:(track|album|playlist|artist):([A-Za-z0-9]{22})$")
        .expect("regex de URI de Spotify válida")
});

const SOURCE_NAME: &str = "Spotify";
const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const TOP_TRACKS_MARKET: &str = "US";

/// Cliente de Spotify (catálogo cruzado).
///
/// Solo aporta metadata: el audio se busca en el catálogo nativo al
/// reproducir, así que `stream_url` nunca devuelve nada.
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    max_playlist_size: usize,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    duration_ms: Option<u64>,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    album: Option<SpotifyAlbumRef>,
    external_urls: Option<ExternalUrls>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbumRef {
    name: String,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    images: Vec<SpotifyImage>,
    tracks: Paging<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct TopTracks {
    tracks: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Paging<SpotifyTrack>,
}

impl SpotifyTrack {
    /// Convierte a metadata; los tracks de un álbum no traen su álbum
    fn into_metadata(self, album: Option<(&str, Option<&str>)>) -> TrackMetadata {
        let uploader = (!self.artists.is_empty()).then(|| {
            self.artists
                .iter()
                .map(|artist| artist.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        });

        let (album_name, thumbnail) = match (self.album, album) {
            (Some(own), _) => {
                let image = own.images.into_iter().next().map(|image| image.url);
                (Some(own.name), image)
            }
            (None, Some((name, image))) => (Some(name.to_string()), image.map(str::to_string)),
            (None, None) => (None, None),
        };

        let locator = self
            .external_urls
            .and_then(|urls| urls.spotify)
            .or_else(|| self.id.map(|id| format!("https://open.spotify.com/track/{}", id)))
            .unwrap_or_default();

        TrackMetadata {
            locator,
            title: self.name,
            uploader,
            album: album_name,
            duration: self.duration_ms.map(Duration::from_millis),
            thumbnail,
        }
    }
}

fn album_entries(album: SpotifyAlbum) -> Vec<TrackMetadata> {
    let cover = album.images.first().map(|image| image.url.as_str());
    album
        .tracks
        .items
        .into_iter()
        .map(|track| track.into_metadata(Some((album.name.as_str(), cover))))
        .collect()
}

fn playlist_entries(page: Paging<PlaylistItem>) -> Vec<TrackMetadata> {
    // Tracks locales o eliminados vienen como null
    page.items
        .into_iter()
        .filter_map(|item| item.track)
        .map(|track| track.into_metadata(None))
        .collect()
}

fn media_kind(segment: &str) -> Option<MediaKind> {
    match segment {
        "track" => Some(MediaKind::Track),
        "album" => Some(MediaKind::Album),
        "playlist" => Some(MediaKind::Playlist),
        "artist" => Some(MediaKind::Artist),
        _ => None,
    }
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, max_playlist_size: usize) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            client_id,
            client_secret,
            max_playlist_size,
            token: Mutex::new(None),
        }
    }

    /// Extrae tipo e id de un enlace web o URI de Spotify
    pub fn parse_spotify_url(raw: &str) -> Option<CatalogLink> {
        let captures = WEB_LINK
            .captures(raw)
            .or_else(|| URI_LINK.captures(raw.trim()))?;
        let kind = media_kind(&captures[1])?;
        Some(CatalogLink::new(kind, &captures[2]))
    }

    /// Token de client credentials, renovado un minuto antes de expirar
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        debug!("🔑 Renovando token de Spotify");
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", credentials))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| MusicError::provider(SOURCE_NAME, e))?;

        if !response.status().is_success() {
            return Err(MusicError::provider(
                SOURCE_NAME,
                format!("autenticación rechazada ({})", response.status()),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MusicError::provider(SOURCE_NAME, e))?;

        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    /// GET autenticado; `None` si el recurso no existe o el id es inválido
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Option<T>> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{}{}", API_BASE, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| MusicError::provider(SOURCE_NAME, e))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                debug!("Spotify no encontró {}", path);
                Ok(None)
            }
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| MusicError::provider(SOURCE_NAME, e)),
            status => Err(MusicError::provider(SOURCE_NAME, format!("respuesta {} en {}", status, path))),
        }
    }
}

#[async_trait]
impl MediaProvider for SpotifyClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CrossCatalog
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn owns(&self, url: &Url) -> bool {
        url.scheme() == "spotify"
            || matches!(url.host_str(), Some("open.spotify.com") | Some("play.spotify.com"))
    }

    fn parse_link(&self, raw: &str) -> Option<CatalogLink> {
        Self::parse_spotify_url(raw)
    }

    async fn resolve_by_id(&self, kind: MediaKind, id: &str) -> Result<Option<TrackMetadata>> {
        if kind != MediaKind::Track {
            debug!("resolve_by_id no aplica a {:?}", kind);
            return Ok(None);
        }

        let track: Option<SpotifyTrack> = self.get(&format!("/tracks/{}", id), &[]).await?;
        Ok(track.map(|track| track.into_metadata(None)))
    }

    async fn search(&self, query: &str) -> Result<Option<TrackMetadata>> {
        info!("🔍 Buscando en Spotify: {}", query);

        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("limit", "1".to_string()),
        ];
        let response: Option<SearchResponse> = self.get("/search", &params).await?;

        Ok(response
            .and_then(|response| response.tracks.items.into_iter().next())
            .map(|track| track.into_metadata(None)))
    }

    async fn resolve_playlist(&self, kind: MediaKind, id: &str) -> Result<Vec<TrackMetadata>> {
        info!("📋 Obteniendo {:?} de Spotify: {}", kind, id);

        let entries = match kind {
            MediaKind::Album => self
                .get::<SpotifyAlbum>(&format!("/albums/{}", id), &[])
                .await?
                .map(album_entries),
            MediaKind::Playlist => {
                let limit = self.max_playlist_size.clamp(1, 100).to_string();
                self.get::<Paging<PlaylistItem>>(&format!("/playlists/{}/tracks", id), &[("limit", limit)])
                    .await?
                    .map(playlist_entries)
            }
            MediaKind::Artist => self
                .get::<TopTracks>(
                    &format!("/artists/{}/top-tracks", id),
                    &[("market", TOP_TRACKS_MARKET.to_string())],
                )
                .await?
                .map(|top| top.tracks.into_iter().map(|track| track.into_metadata(None)).collect()),
            MediaKind::Track | MediaKind::Video => None,
        };

        Ok(entries.unwrap_or_default())
    }

    async fn stream_url(&self, _locator: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
