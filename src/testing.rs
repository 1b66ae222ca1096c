//! Fakes compartidos por los tests unitarios.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::runtime::Handle;
use url::Url;

use crate::{
    audio::{
        queue::PlayableItem,
        session::{SessionSnapshot, TenantSession},
        sink::{AudioSink, FinishedCallback, NotificationHandle, Notifier, SinkFactory},
    },
    error::{MusicError, Result},
    sources::{CatalogLink, MediaKind, MediaProvider, ProviderKind, ProviderSet, TrackMetadata},
};

pub const GUILD: u64 = 1;
pub const TRACK_SECS: u64 = 180;

pub fn track(title: &str) -> TrackMetadata {
    TrackMetadata {
        locator: format!("https://media.test/{}", title),
        title: title.to_string(),
        uploader: Some("Uploader".to_string()),
        duration: Some(Duration::from_secs(TRACK_SECS)),
        thumbnail: Some(format!("https://media.test/{}.jpg", title)),
        ..TrackMetadata::default()
    }
}

/// Item nativo de 180s pedido por el usuario 1
pub fn item(title: &str) -> PlayableItem {
    PlayableItem::from_metadata(track(title), UserId::new(1), ProviderKind::NativeCatalog)
        .expect("el track de prueba tiene duración")
}

/// Item de catálogo cruzado; se busca en el nativo al reproducirse
pub fn cross_item(title: &str) -> PlayableItem {
    PlayableItem::from_metadata(track(title), UserId::new(1), ProviderKind::CrossCatalog)
        .expect("el track de prueba tiene duración")
}

pub fn titles(items: &[PlayableItem]) -> Vec<&str> {
    items.iter().map(PlayableItem::title).collect()
}

/// Espera (con límite) a que el estado cumpla la condición
pub async fn wait_for<F>(session: &Arc<TenantSession>, condition: F) -> SessionSnapshot
where
    F: Fn(&SessionSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = session.snapshot().await;
        if condition(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("condición no alcanzada; último estado: {:?}", snapshot);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Catálogo nativo en memoria.
///
/// `https://media.test/<título>` es un video, `https://media.test/list/a,b,c`
/// una playlist. Los títulos que empiezan con `broken` no tienen stream y las
/// búsquedas que contienen `missing` no encuentran nada.
pub struct StaticProvider;

#[async_trait]
impl MediaProvider for StaticProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::NativeCatalog
    }

    fn source_name(&self) -> &'static str {
        "Static"
    }

    fn owns(&self, url: &Url) -> bool {
        url.host_str() == Some("media.test")
    }

    fn parse_link(&self, raw: &str) -> Option<CatalogLink> {
        let url = Url::parse(raw).ok()?;
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["list", ids] => Some(CatalogLink::new(MediaKind::Playlist, *ids)),
            [id] => Some(CatalogLink::new(MediaKind::Video, *id)),
            _ => None,
        }
    }

    async fn resolve_by_id(&self, _kind: MediaKind, id: &str) -> Result<Option<TrackMetadata>> {
        Ok(Some(track(id)))
    }

    async fn search(&self, query: &str) -> Result<Option<TrackMetadata>> {
        if query.contains("missing") {
            return Ok(None);
        }
        Ok(Some(track(query)))
    }

    async fn resolve_playlist(&self, _kind: MediaKind, id: &str) -> Result<Vec<TrackMetadata>> {
        Ok(id.split(',').map(track).collect())
    }

    async fn stream_url(&self, locator: &str) -> Result<Option<String>> {
        if locator.contains("/broken") {
            return Ok(None);
        }
        Ok(Some(format!("stream://{}", locator)))
    }
}

#[derive(Default)]
struct SinkState {
    played: Vec<String>,
    on_finished: Option<FinishedCallback>,
    playing: bool,
    paused: bool,
    fail_next_play: bool,
    fail_next_stop: bool,
}

/// Sink que registra lo reproducido y deja que el test decida cuándo termina
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn played(&self) -> Vec<String> {
        self.state.lock().played.clone()
    }

    pub fn paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn fail_next_play(&self) {
        self.state.lock().fail_next_play = true;
    }

    /// El próximo `stop` falla y el track sigue sonando
    pub fn fail_next_stop(&self) {
        self.state.lock().fail_next_stop = true;
    }

    /// El track actual termina solo
    pub fn finish(&self) {
        let callback = {
            let mut state = self.state.lock();
            state.playing = false;
            state.paused = false;
            state.on_finished.take()
        };
        if let Some(callback) = callback {
            callback();
        }
    }

    /// El track desaparece sin avisar
    pub fn lose_track(&self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.paused = false;
        state.on_finished = None;
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, source: &str, on_finished: FinishedCallback) -> Result<()> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_play) {
            return Err(MusicError::Sink("sin conexión de voz".into()));
        }
        state.played.push(source.to_string());
        state.on_finished = Some(on_finished);
        state.playing = true;
        state.paused = false;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.playing = false;
        state.paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.playing = true;
        state.paused = false;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if std::mem::take(&mut self.state.lock().fail_next_stop) {
            return Err(MusicError::Sink("la pista no responde".into()));
        }
        self.finish();
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    async fn is_paused(&self) -> bool {
        self.state.lock().paused
    }
}

#[derive(Default)]
pub struct RecordingSinks {
    sinks: DashMap<GuildId, Arc<RecordingSink>>,
}

impl RecordingSinks {
    pub fn get(&self, guild_id: GuildId) -> Arc<RecordingSink> {
        Arc::clone(self.sinks.entry(guild_id).or_default().value())
    }
}

impl SinkFactory for RecordingSinks {
    fn sink_for(&self, guild_id: GuildId) -> Arc<dyn AudioSink> {
        self.get(guild_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    Sent { channel: u64, message: u64, title: String },
    Deleted { message: u64 },
}

#[derive(Default)]
pub struct RecordingNotifier {
    next_id: AtomicU64,
    events: Mutex<Vec<NotifierEvent>>,
    live: Mutex<Vec<u64>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().clone()
    }

    /// Mensajes aún visibles en el canal
    pub fn live_messages(&self) -> Vec<u64> {
        self.live.lock().clone()
    }

    /// Simula que alguien borró los mensajes a mano
    pub fn forget_all(&self) {
        self.live.lock().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_now_playing(&self, channel_id: ChannelId, item: &PlayableItem) -> Result<NotificationHandle> {
        let message = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().push(NotifierEvent::Sent {
            channel: channel_id.get(),
            message,
            title: item.title().to_string(),
        });
        self.live.lock().push(message);
        Ok(NotificationHandle {
            channel_id,
            message_id: MessageId::new(message),
        })
    }

    async fn delete(&self, handle: NotificationHandle) {
        let message = handle.message_id.get();
        self.events.lock().push(NotifierEvent::Deleted { message });
        self.live.lock().retain(|id| *id != message);
    }
}

/// Piezas de una sesión de prueba conectadas entre sí
pub struct Fixture {
    pub providers: Arc<ProviderSet>,
    pub sinks: Arc<RecordingSinks>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            providers: Arc::new(ProviderSet::new(Arc::new(StaticProvider))),
            sinks: Arc::new(RecordingSinks::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn session(&self) -> Arc<TenantSession> {
        let guild_id = GuildId::new(GUILD);
        TenantSession::new(
            guild_id,
            100,
            Arc::clone(&self.providers),
            self.sinks.sink_for(guild_id),
            Arc::clone(&self.notifier) as Arc<dyn Notifier>,
            Handle::current(),
        )
    }

    pub fn sink(&self) -> Arc<RecordingSink> {
        self.sinks.get(GuildId::new(GUILD))
    }

    pub fn notifier(&self) -> &RecordingNotifier {
        &self.notifier
    }
}
