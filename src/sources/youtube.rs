use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{sync::LazyLock, time::Duration};
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, info, warn};
use url::Url;

use super::{CatalogLink, MediaKind, MediaProvider, ProviderKind, TrackMetadata};
use crate::error::{MusicError, Result};

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("regex de video válida"));

static PLAYLIST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]list=([^&#]+)").expect("regex de playlist válida"));

const SOURCE_NAME: &str = "YouTube";

/// Cliente del catálogo nativo, vía yt-dlp
pub struct YouTubeClient {
    ytdlp_path: String,
    max_playlist_size: usize,
    command_timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (video completo o entrada plana de playlist)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    album: Option<String>,
    thumbnail: Option<String>,
    thumbnails: Option<Vec<Thumbnail>>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    url: Option<String>,
    is_live: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpInfo {
    fn into_metadata(self) -> Option<TrackMetadata> {
        let title = self.title?;
        let locator = self
            .webpage_url
            .or(self.original_url)
            .or(self.url)
            .or_else(|| self.id.map(|id| format!("https://youtu.be/{}", id)))?;

        // Los directos no tienen duración programable
        let duration = match self.is_live {
            Some(true) => None,
            _ => self
                .duration
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
        };

        let thumbnail = self
            .thumbnails
            .and_then(|thumbs| thumbs.into_iter().last())
            .map(|thumb| thumb.url)
            .or(self.thumbnail);

        Some(TrackMetadata {
            locator,
            title,
            uploader: self.uploader.or(self.channel),
            album: self.album,
            duration,
            thumbnail,
        })
    }
}

/// Parsea la salida de `--dump-json` (un objeto JSON por línea)
fn parse_dump(stdout: &str) -> Vec<TrackMetadata> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => info.into_metadata(),
            Err(e) => {
                debug!("Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
        .collect()
}

impl YouTubeClient {
    pub fn new(ytdlp_path: impl Into<String>, max_playlist_size: usize) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            max_playlist_size,
            command_timeout: Duration::from_secs(30),
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Verifica si una URL es de YouTube (incluye variantes por país)
    pub fn is_youtube_host(host: &str) -> bool {
        let host = host.to_lowercase();
        host == "youtu.be"
            || host
                .split('.')
                .any(|label| label == "youtube" || label == "youtube-nocookie")
    }

    /// Extrae el tipo de contenido y el id de un enlace de YouTube
    pub fn parse_youtube_url(raw: &str) -> Option<CatalogLink> {
        let mut url = raw.to_string();
        if url.contains("attribution") {
            url = url
                .replace("attribution", "attr")
                .replace("watch%3Fv%3D", "watch?v=");
        }
        if url.contains("oembed") {
            url = url.replace("watch?v%3D", "watch?v=");
        }

        // Un video gana aunque el enlace también traiga una playlist
        if let Some(captures) = VIDEO_ID.captures(&url) {
            return Some(CatalogLink::new(MediaKind::Video, &captures[1]));
        }

        PLAYLIST_ID
            .captures(&url)
            .map(|captures| CatalogLink::new(MediaKind::Playlist, &captures[1]))
    }

    pub fn video_url(id: &str) -> String {
        format!("https://youtu.be/{}", id)
    }

    pub fn playlist_url(id: &str) -> String {
        format!("https://youtube.com/playlist?list={}", id)
    }

    /// Ejecuta yt-dlp; `None` si terminó con error (contenido no disponible)
    async fn run(&self, args: &[&str]) -> Result<Option<String>> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| MusicError::provider(SOURCE_NAME, e))?;

        let output = timeout(
            self.command_timeout,
            Command::new(&self.ytdlp_path)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| MusicError::provider(SOURCE_NAME, "timeout de yt-dlp"))?
        .map_err(|e| MusicError::provider(SOURCE_NAME, format!("Error al ejecutar yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("⚠️ yt-dlp terminó con error: {}", error.trim());
            return Ok(None);
        }

        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    /// Obtiene información de una URL específica
    async fn get_info(&self, url: &str) -> Result<Option<TrackMetadata>> {
        debug!("📊 Obteniendo info de: {}", url);

        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", url])
            .await?;

        Ok(stdout.and_then(|out| parse_dump(&out).into_iter().next()))
    }
}

#[async_trait]
impl MediaProvider for YouTubeClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::NativeCatalog
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn owns(&self, url: &Url) -> bool {
        url.host_str().is_some_and(Self::is_youtube_host)
    }

    fn parse_link(&self, raw: &str) -> Option<CatalogLink> {
        Self::parse_youtube_url(raw)
    }

    async fn resolve_by_id(&self, kind: MediaKind, id: &str) -> Result<Option<TrackMetadata>> {
        if kind.is_container() {
            debug!("resolve_by_id no aplica a {:?}", kind);
            return Ok(None);
        }
        self.get_info(&Self::video_url(id)).await
    }

    async fn search(&self, query: &str) -> Result<Option<TrackMetadata>> {
        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch1:{}", query);
        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ])
            .await?;

        Ok(stdout.and_then(|out| parse_dump(&out).into_iter().next()))
    }

    async fn resolve_playlist(&self, kind: MediaKind, id: &str) -> Result<Vec<TrackMetadata>> {
        if kind != MediaKind::Playlist {
            debug!("YouTube no expande {:?}", kind);
            return Ok(Vec::new());
        }

        let url = Self::playlist_url(id);
        info!("📋 Obteniendo playlist: {}", url);

        let max_items = self.max_playlist_size.to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-end",
                &max_items,
                "--no-warnings",
                &url,
            ])
            .await?;

        Ok(stdout.map(|out| parse_dump(&out)).unwrap_or_default())
    }

    async fn stream_url(&self, locator: &str) -> Result<Option<String>> {
        debug!("🎵 Obteniendo URL de stream para: {}", locator);

        let stdout = self
            .run(&["--no-playlist", "-f", "bestaudio/best", "--get-url", "--no-warnings", locator])
            .await?;

        Ok(stdout
            .and_then(|out| out.lines().next().map(|line| line.trim().to_string()))
            .filter(|url| !url.is_empty()))
    }
}
