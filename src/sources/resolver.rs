use serenity::model::id::UserId;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

use super::{CatalogLink, MediaProvider, ProviderSet, TrackMetadata};
use crate::{
    audio::queue::PlayableItem,
    error::{MusicError, Result},
};

/// Lo que se agregó a partir de una entrada del usuario
#[derive(Debug, Clone)]
pub struct ResolvedBatch {
    pub items: Vec<PlayableItem>,
    /// Miniatura representativa del lote
    pub thumbnail: Option<String>,
}

impl ResolvedBatch {
    pub fn new(items: Vec<PlayableItem>) -> Self {
        let thumbnail = items.iter().find_map(|item| item.thumbnail().map(str::to_string));
        Self { items, thumbnail }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(PlayableItem::duration).sum()
    }
}

/// Entrada ya clasificada
enum Input<'a> {
    Link {
        provider: &'a Arc<dyn MediaProvider>,
        link: CatalogLink,
    },
    Query(&'a str),
}

/// Convierte texto libre o enlaces en items reproducibles
pub struct MediaResolver {
    providers: Arc<ProviderSet>,
    max_song_duration: Duration,
    max_playlist_size: usize,
}

impl MediaResolver {
    pub fn new(providers: Arc<ProviderSet>, max_song_duration: Duration, max_playlist_size: usize) -> Self {
        Self {
            providers,
            max_song_duration,
            max_playlist_size,
        }
    }

    pub fn providers(&self) -> &Arc<ProviderSet> {
        &self.providers
    }

    /// Resuelve la entrada del usuario sin tocar ninguna cola
    pub async fn interpret(&self, raw: &str, requester: UserId) -> Result<ResolvedBatch> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MusicError::InvalidLink);
        }

        match self.classify(raw)? {
            Input::Query(query) => {
                info!("🔍 Buscando: {}", query);
                let native = self.providers.native();
                let meta = native
                    .search(query)
                    .await?
                    .ok_or_else(|| MusicError::NoSearchResults(query.to_string()))?;
                let item = self.single(meta, native.as_ref(), requester)?;
                Ok(ResolvedBatch::new(vec![item]))
            }
            Input::Link { provider, link } if link.kind.is_container() => {
                debug!("📋 Expandiendo {:?} {} de {}", link.kind, link.id, provider.source_name());
                let entries = provider.resolve_playlist(link.kind, &link.id).await?;
                let items = self.playable_entries(entries, provider.as_ref(), requester);
                if items.is_empty() {
                    return Err(MusicError::EmptyPlaylist);
                }
                info!("📋 {} entradas reproducibles de {}", items.len(), provider.source_name());
                Ok(ResolvedBatch::new(items))
            }
            Input::Link { provider, link } => {
                let meta = provider
                    .resolve_by_id(link.kind, &link.id)
                    .await?
                    .ok_or(MusicError::InvalidLink)?;
                let item = self.single(meta, provider.as_ref(), requester)?;
                Ok(ResolvedBatch::new(vec![item]))
            }
        }
    }

    fn classify<'a>(&'a self, raw: &'a str) -> Result<Input<'a>> {
        if let Ok(url) = Url::parse(raw) {
            if let Some(provider) = self.providers.owner_of(&url) {
                return Self::link(provider, raw);
            }

            return match (url.scheme(), url.host_str()) {
                ("http" | "https", Some(host)) => Err(MusicError::UnsupportedProvider(host.to_string())),
                ("spotify", _) => Err(MusicError::UnsupportedProvider(url.scheme().to_string())),
                _ => Ok(Input::Query(raw)),
            };
        }

        // Sin esquema solo cuenta como enlace si un proveedor reconoce el host
        if let Some((url, normalized)) = scheme_less_url(raw) {
            if let Some(provider) = self.providers.owner_of(&url) {
                return Self::link(provider, &normalized);
            }
        }

        Ok(Input::Query(raw))
    }

    fn link<'a>(provider: &'a Arc<dyn MediaProvider>, raw: &str) -> Result<Input<'a>> {
        let link = provider.parse_link(raw).ok_or(MusicError::InvalidLink)?;
        Ok(Input::Link { provider, link })
    }

    /// Un único item: se exige duración conocida y dentro del límite
    fn single(&self, meta: TrackMetadata, provider: &dyn MediaProvider, requester: UserId) -> Result<PlayableItem> {
        let title = meta.title.clone();
        let item = PlayableItem::from_metadata(meta, requester, provider.kind()).ok_or(MusicError::InvalidLink)?;

        if item.duration() > self.max_song_duration {
            return Err(MusicError::TrackTooLong {
                title,
                max: self.max_song_duration,
            });
        }

        Ok(item)
    }

    /// Entradas de un contenedor; las no reproducibles se omiten
    fn playable_entries(
        &self,
        entries: Vec<TrackMetadata>,
        provider: &dyn MediaProvider,
        requester: UserId,
    ) -> Vec<PlayableItem> {
        let total = entries.len();
        let items: Vec<PlayableItem> = entries
            .into_iter()
            .filter_map(|meta| PlayableItem::from_metadata(meta, requester, provider.kind()))
            .filter(|item| item.duration() <= self.max_song_duration)
            .take(self.max_playlist_size)
            .collect();

        if items.len() < total.min(self.max_playlist_size) {
            warn!(
                "⚠️ {} entradas omitidas (sin duración o demasiado largas)",
                total.min(self.max_playlist_size) - items.len()
            );
        }

        items
    }
}

/// Reintenta con `https://` si la entrada parece host/ruta
fn scheme_less_url(raw: &str) -> Option<(Url, String)> {
    if raw.contains(char::is_whitespace) {
        return None;
    }

    let host = raw.split('/').next()?;
    if !host.contains('.') || host.starts_with('.') || host.ends_with('.') {
        return None;
    }

    let normalized = format!("https://{}", raw);
    Url::parse(&normalized).ok().map(|url| (url, normalized))
}
