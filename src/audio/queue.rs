use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::{
    error::{MusicError, Result},
    sources::{ProviderKind, ProviderSet, TrackMetadata},
};

/// Item reproducible ya resuelto; inmutable una vez construido.
///
/// Solo existe con duración conocida: la metadata sin duración se rechaza
/// antes de llegar a la cola.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableItem {
    locator: String,
    requested_by: UserId,
    duration: Duration,
    title: String,
    uploader: Option<String>,
    album: Option<String>,
    thumbnail: Option<String>,
    provider: ProviderKind,
    added_at: DateTime<Utc>,
}

impl PlayableItem {
    pub fn from_metadata(meta: TrackMetadata, requested_by: UserId, provider: ProviderKind) -> Option<Self> {
        let duration = meta.duration?;
        Some(Self {
            locator: meta.locator,
            requested_by,
            duration,
            title: meta.title,
            uploader: meta.uploader,
            album: meta.album,
            thumbnail: meta.thumbnail,
            provider,
            added_at: Utc::now(),
        })
    }

    // Getters
    pub fn locator(&self) -> &str {
        &self.locator
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn duration(&self) -> Duration {
        self.duration
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn uploader(&self) -> Option<&str> {
        self.uploader.as_deref()
    }
    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// Consulta con la que un item de otro catálogo se busca en el nativo
    pub fn cross_catalog_query(&self) -> String {
        [Some(self.title.as_str()), self.uploader(), self.album()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Obtiene la URL reproducible justo antes de reproducir (las URLs expiran)
    pub async fn resolve_source(&self, providers: &ProviderSet) -> Result<String> {
        let native = providers.native();

        let locator = match self.provider {
            ProviderKind::NativeCatalog => self.locator.clone(),
            ProviderKind::CrossCatalog => {
                let query = self.cross_catalog_query();
                debug!("🔁 Buscando equivalente nativo de '{}'", query);
                native
                    .search(&query)
                    .await?
                    .ok_or(MusicError::NoSearchResults(query))?
                    .locator
            }
        };

        native.stream_url(&locator).await?.ok_or(MusicError::InvalidLink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Disabled,
    Song,
    Queue,
}

/// Cola FIFO de un guild, con el slot "reproduciendo ahora" y el modo loop.
///
/// No es thread-safe por sí misma: vive dentro del lock del guild.
#[derive(Debug)]
pub struct PlaybackQueue {
    items: VecDeque<PlayableItem>,
    current: Option<PlayableItem>,
    loop_mode: LoopMode,
    max_size: usize,
}

impl PlaybackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            loop_mode: LoopMode::Disabled,
            max_size,
        }
    }

    /// Agrega un lote respetando el espacio disponible; devuelve lo agregado
    pub fn enqueue_batch(&mut self, batch: Vec<PlayableItem>) -> Result<Vec<PlayableItem>> {
        let available_space = self.max_size.saturating_sub(self.items.len());
        if available_space == 0 && !batch.is_empty() {
            return Err(MusicError::QueueFull(self.max_size));
        }

        let added: Vec<PlayableItem> = batch.into_iter().take(available_space).collect();
        self.items.extend(added.iter().cloned());

        info!("➕ Agregadas {} canciones a la cola", added.len());
        Ok(added)
    }

    /// Hay algo que reproducir: cola no vacía o un loop con track previo
    pub fn has_next(&self) -> bool {
        !self.items.is_empty() || (self.loop_mode != LoopMode::Disabled && self.current.is_some())
    }

    /// Decide el siguiente item según el modo loop y lo deja como actual.
    ///
    /// `skipping` fuerza avanzar aunque el modo sea `Song`.
    pub fn advance(&mut self, skipping: bool) -> Option<PlayableItem> {
        match self.loop_mode {
            LoopMode::Song if !skipping => {
                if let Some(current) = &self.current {
                    info!("🔂 Repitiendo track: {}", current.title);
                    return Some(current.clone());
                }
            }
            LoopMode::Queue => {
                if let Some(previous) = self.current.take() {
                    debug!("🔁 Track agregado al final por loop de cola: {}", previous.title);
                    self.items.push_back(previous);
                }
            }
            _ => {}
        }

        self.current = self.items.pop_front();
        match &self.current {
            Some(item) => info!("➡️ Siguiente en cola: {}", item.title),
            None => info!("📭 Cola vacía, no hay siguiente track"),
        }
        self.current.clone()
    }

    /// Descarta el actual (falló al resolverse o se detuvo)
    pub fn discard_current(&mut self) -> Option<PlayableItem> {
        self.current.take()
    }

    /// Devuelve el actual a la cabeza de la cola
    pub fn requeue_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.items.push_front(current);
        }
    }

    /// Descarta hasta `amount` items de la cabeza; devuelve cuántos
    pub fn drop_front(&mut self, amount: usize) -> usize {
        let skipped = amount.min(self.items.len());
        self.items.drain(..skipped);
        skipped
    }

    /// Limpia la cola (no toca el actual)
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        info!("🗑️ Cola limpiada: {} tracks removidos", cleared);
        cleared
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        match mode {
            LoopMode::Disabled => info!("➡️ Repetición desactivada"),
            LoopMode::Song => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn current(&self) -> Option<&PlayableItem> {
        self.current.as_ref()
    }

    pub fn items(&self) -> impl Iterator<Item = &PlayableItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Suma de duraciones en cola, sin contar el actual
    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(|item| item.duration).sum()
    }

    /// Obtiene una página (base 0) acotada a la última página con contenido
    pub fn page(&self, page: usize, page_size: usize) -> QueuePage {
        let page_size = page_size.max(1);
        let total_items = self.items.len();
        let last_page = total_items.saturating_sub(1) / page_size;
        let page = page.min(last_page);

        let start = page * page_size;
        let end = (start + page_size).min(total_items);

        QueuePage {
            items: self.items.range(start..end).cloned().collect(),
            page,
            page_size,
            total_pages: last_page + 1,
            total_items,
            total_duration: self.total_duration(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    /// Página ya acotada, base 0
    pub items: Vec<PlayableItem>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub total_duration: Duration,
}
