pub mod resolver;
pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use url::Url;

use crate::error::Result;

pub use resolver::{MediaResolver, ResolvedBatch};
pub use spotify::SpotifyClient;
pub use youtube::YouTubeClient;

/// Catálogo al que pertenece un item.
///
/// Los items nativos se reproducen directamente desde su propio catálogo; los
/// de otro catálogo solo guardan metadata y se buscan en el catálogo nativo al
/// momento de reproducirse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    NativeCatalog,
    CrossCatalog,
}

/// Tipo de contenido al que apunta un enlace de catálogo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Track,
    Video,
    Playlist,
    Album,
    Artist,
}

impl MediaKind {
    /// Los contenedores se expanden en varias entradas
    pub fn is_container(&self) -> bool {
        matches!(self, MediaKind::Playlist | MediaKind::Album | MediaKind::Artist)
    }
}

/// Enlace ya clasificado: tipo de contenido + id canónico
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLink {
    pub kind: MediaKind,
    pub id: String,
}

impl CatalogLink {
    pub fn new(kind: MediaKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Metadata de un track tal como la devuelve un proveedor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub locator: String,
    pub title: String,
    pub uploader: Option<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
}

/// Trait común para todas las fuentes de música.
///
/// "No encontrado" se expresa como `Ok(None)`; `Err` queda reservado para
/// fallos de transporte o del backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Nombre de la fuente
    fn source_name(&self) -> &'static str;

    /// Verifica si la URL pertenece a este catálogo
    fn owns(&self, url: &Url) -> bool;

    /// Extrae tipo de contenido e id canónico de un enlace propio
    fn parse_link(&self, raw: &str) -> Option<CatalogLink>;

    async fn resolve_by_id(&self, kind: MediaKind, id: &str) -> Result<Option<TrackMetadata>>;

    /// Primer resultado de una búsqueda por texto
    async fn search(&self, query: &str) -> Result<Option<TrackMetadata>>;

    /// Entradas de una playlist/álbum/artista en orden; pueden no tener duración
    async fn resolve_playlist(&self, kind: MediaKind, id: &str) -> Result<Vec<TrackMetadata>>;

    /// URL reproducible (expira); solo el catálogo nativo la provee
    async fn stream_url(&self, locator: &str) -> Result<Option<String>>;
}

/// Proveedores disponibles: el nativo (búsquedas y streams) y los demás
#[derive(Clone)]
pub struct ProviderSet {
    native: Arc<dyn MediaProvider>,
    others: Vec<Arc<dyn MediaProvider>>,
}

impl ProviderSet {
    pub fn new(native: Arc<dyn MediaProvider>) -> Self {
        Self {
            native,
            others: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn MediaProvider>) -> Self {
        self.others.push(provider);
        self
    }

    pub fn native(&self) -> &Arc<dyn MediaProvider> {
        &self.native
    }

    /// Primer proveedor que reconoce la URL
    pub fn owner_of(&self, url: &Url) -> Option<&Arc<dyn MediaProvider>> {
        std::iter::once(&self.native)
            .chain(self.others.iter())
            .find(|provider| provider.owns(url))
    }
}
