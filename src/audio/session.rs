//! Playback session of a single guild.
//!
//! All mutations of the queue, the current item and the loop mode happen under
//! the session lock. Control commands arrive through the [`CommandLane`], the
//! completion callback of the audio sink arrives from the sink's own context,
//! and both end up in [`TenantSession::advance`] holding that same lock.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{runtime::Handle, sync::Mutex};
use tracing::{debug, error, info, warn};

use super::{
    commands::{Command, CommandExecutor, CommandLane},
    queue::{LoopMode, PlayableItem, PlaybackQueue, QueuePage},
    sink::{AudioSink, FinishedCallback, NotificationHandle, Notifier},
};
use crate::{error::Result, sources::ProviderSet};

/// Estado del reproductor de un guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    Idle,
    Playing,
    Paused,
}

struct SessionState {
    queue: PlaybackQueue,
    phase: PlayerPhase,
    reply_channel: Option<ChannelId>,
    notification: Option<NotificationHandle>,
    /// Cambia en cada avance; los callbacks de fin con otra época se ignoran
    epoch: u64,
    /// El próximo avance ignora el loop de canción
    skip_pending: bool,
}

/// Copia del estado para lectura fuera del lock
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: PlayerPhase,
    pub now_playing: Option<PlayableItem>,
    pub loop_mode: LoopMode,
    pub queue: Vec<PlayableItem>,
    pub reply_channel: Option<ChannelId>,
}

impl SessionSnapshot {
    pub fn queue_duration(&self) -> Duration {
        self.queue.iter().map(PlayableItem::duration).sum()
    }
}

pub struct TenantSession {
    guild_id: GuildId,
    state: Mutex<SessionState>,
    lane: CommandLane<TenantSession>,
    providers: Arc<ProviderSet>,
    sink: Arc<dyn AudioSink>,
    notifier: Arc<dyn Notifier>,
    runtime: Handle,
    this: Weak<TenantSession>,
}

impl TenantSession {
    pub fn new(
        guild_id: GuildId,
        max_queue_size: usize,
        providers: Arc<ProviderSet>,
        sink: Arc<dyn AudioSink>,
        notifier: Arc<dyn Notifier>,
        runtime: Handle,
    ) -> Arc<Self> {
        debug!("🆕 Nueva sesión para guild {}", guild_id);
        Arc::new_cyclic(|this| Self {
            guild_id,
            state: Mutex::new(SessionState {
                queue: PlaybackQueue::new(max_queue_size),
                phase: PlayerPhase::Idle,
                reply_channel: None,
                notification: None,
                epoch: 0,
                skip_pending: false,
            }),
            lane: CommandLane::new(this.clone(), runtime.clone()),
            providers,
            sink,
            notifier,
            runtime,
            this: this.clone(),
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Encola un comando de control; no bloquea
    pub fn submit(&self, command: Command) {
        debug!("📨 Comando {:?} para guild {}", command, self.guild_id);
        self.lane.submit(command);
    }

    /// Agrega items al final de la cola; devuelve los que entraron
    pub async fn enqueue(&self, items: Vec<PlayableItem>) -> Result<Vec<PlayableItem>> {
        let mut state = self.state.lock().await;
        state.queue.enqueue_batch(items)
    }

    /// Fija el canal de notificaciones si aún no hay uno
    pub async fn set_reply_channel_if_unset(&self, channel_id: ChannelId) {
        let mut state = self.state.lock().await;
        if state.reply_channel.is_none() {
            state.reply_channel = Some(channel_id);
        }
    }

    /// Arranca la reproducción si el reproductor está parado
    pub async fn wake_up(&self) {
        let mut state = self.state.lock().await;

        let stalled = match state.phase {
            PlayerPhase::Idle => true,
            _ => !self.sink.is_playing().await && !self.sink.is_paused().await,
        };

        if !stalled {
            debug!("▶️ Guild {} ya está reproduciendo", self.guild_id);
            return;
        }

        if state.phase != PlayerPhase::Idle {
            warn!("⚠️ Guild {} sin audio activo, retomando la cola", self.guild_id);
        }

        if state.queue.has_next() {
            self.advance(&mut state).await;
        } else if state.phase != PlayerPhase::Idle {
            state.queue.discard_current();
            self.go_idle(&mut state).await;
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            phase: state.phase,
            now_playing: state.queue.current().cloned(),
            loop_mode: state.queue.loop_mode(),
            queue: state.queue.items().cloned().collect(),
            reply_channel: state.reply_channel,
        }
    }

    pub async fn page(&self, page: usize, page_size: usize) -> QueuePage {
        self.state.lock().await.queue.page(page, page_size)
    }

    /// Punto de entrada del callback de fin del sink
    async fn on_track_finished(&self, epoch: u64) {
        let mut state = self.state.lock().await;

        if state.epoch != epoch || state.phase == PlayerPhase::Idle {
            debug!("⏭️ Fin de track obsoleto ignorado en guild {}", self.guild_id);
            return;
        }

        debug!("🏁 Track terminado en guild {}", self.guild_id);
        self.advance(&mut state).await;
    }

    /// Elige el siguiente item según el loop, resuelve su fuente y lo entrega
    /// al sink. Los items que no se pueden resolver se descartan; cada vuelta
    /// consume un item de la cola, así que termina en `Idle` si todos fallan.
    async fn advance(&self, state: &mut SessionState) {
        state.epoch += 1;
        let mut skipping = std::mem::take(&mut state.skip_pending);

        loop {
            let Some(item) = state.queue.advance(skipping) else {
                self.go_idle(state).await;
                return;
            };

            let source = match item.resolve_source(&self.providers).await {
                Ok(source) => source,
                Err(e) => {
                    warn!("⚠️ No se pudo obtener la fuente de '{}': {}", item.title(), e);
                    state.queue.discard_current();
                    skipping = true;
                    continue;
                }
            };

            if let Err(e) = self.sink.play(&source, self.finished_callback(state.epoch)).await {
                error!("❌ Error al reproducir '{}' en guild {}: {}", item.title(), self.guild_id, e);
                state.queue.requeue_current();
                self.go_idle(state).await;
                return;
            }

            info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, item.title());
            state.phase = PlayerPhase::Playing;
            self.announce(state, &item).await;
            return;
        }
    }

    async fn go_idle(&self, state: &mut SessionState) {
        if state.phase != PlayerPhase::Idle {
            info!("⏹️ Guild {} sin más tracks", self.guild_id);
        }
        state.phase = PlayerPhase::Idle;

        if let Some(previous) = state.notification.take() {
            self.notifier.delete(previous).await;
        }
    }

    fn finished_callback(&self, epoch: u64) -> FinishedCallback {
        let session = self.this.clone();
        let runtime = self.runtime.clone();

        Box::new(move || {
            runtime.spawn(async move {
                if let Some(session) = session.upgrade() {
                    session.on_track_finished(epoch).await;
                }
            });
        })
    }

    /// Reemplaza la notificación "reproduciendo ahora"
    async fn announce(&self, state: &mut SessionState, item: &PlayableItem) {
        let Some(channel_id) = state.reply_channel else {
            return;
        };

        if let Some(previous) = state.notification.take() {
            self.notifier.delete(previous).await;
        }

        match self.notifier.send_now_playing(channel_id, item).await {
            Ok(handle) => state.notification = Some(handle),
            Err(e) => error!("❌ Error enviando notificación en guild {}: {}", self.guild_id, e),
        }
    }

    async fn skip(&self, count: usize) {
        let mut state = self.state.lock().await;

        if state.phase == PlayerPhase::Idle {
            debug!("⏭️ Nada que saltar en guild {}", self.guild_id);
            return;
        }

        let dropped = state.queue.drop_front(count.max(1) - 1);
        state.skip_pending = true;
        info!("⏭️ Saltando {} track(s) en guild {}", dropped + 1, self.guild_id);

        if let Err(e) = self.sink.stop().await {
            error!("❌ Error deteniendo el track en guild {}: {}", self.guild_id, e);
            state.skip_pending = false;
        }
    }

    async fn stop(&self) {
        let mut state = self.state.lock().await;

        state.queue.clear();
        state.queue.discard_current();
        state.skip_pending = false;

        if state.phase == PlayerPhase::Idle {
            return;
        }

        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        if let Err(e) = self.sink.stop().await {
            error!("❌ Error deteniendo el track en guild {}: {}", self.guild_id, e);
            self.go_idle(&mut state).await;
        }
    }

    async fn toggle_pause(&self) {
        let mut state = self.state.lock().await;

        let result = match state.phase {
            PlayerPhase::Playing => self.sink.pause().await.map(|_| PlayerPhase::Paused),
            PlayerPhase::Paused => self.sink.resume().await.map(|_| PlayerPhase::Playing),
            PlayerPhase::Idle => {
                debug!("⏸️ Nada que pausar en guild {}", self.guild_id);
                return;
            }
        };

        match result {
            Ok(phase) => {
                info!("⏯️ Guild {} ahora en {:?}", self.guild_id, phase);
                state.phase = phase;
            }
            Err(e) => error!("❌ Error cambiando pausa en guild {}: {}", self.guild_id, e),
        }
    }
}

#[async_trait]
impl CommandExecutor for TenantSession {
    type Command = Command;

    async fn execute(&self, command: Command) {
        match command {
            Command::Skip(count) => self.skip(count).await,
            Command::Stop => self.stop().await,
            Command::TogglePause => self.toggle_pause().await,
            Command::SetLoopMode(mode) => {
                self.state.lock().await.queue.set_loop_mode(mode);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cross_item, item, titles, wait_for, Fixture, NotifierEvent};
    use pretty_assertions::assert_eq;

    async fn playing(fixture: &Fixture, queued: &[&str]) -> Arc<TenantSession> {
        let session = fixture.session();
        session
            .enqueue(queued.iter().map(|title| item(title)).collect())
            .await
            .unwrap();
        session.wake_up().await;
        session
    }

    fn now_playing(snapshot: &SessionSnapshot) -> Option<&str> {
        snapshot.now_playing.as_ref().map(PlayableItem::title)
    }

    #[tokio::test]
    async fn test_wake_up_starts_head_of_queue() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B", "C"]).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, PlayerPhase::Playing);
        assert_eq!(now_playing(&snapshot), Some("A"));
        assert_eq!(titles(&snapshot.queue), vec!["B", "C"]);
        assert_eq!(fixture.sink().played(), vec!["stream://https://media.test/A"]);
    }

    #[tokio::test]
    async fn test_wake_up_while_playing_does_nothing() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B"]).await;

        session.wake_up().await;
        assert_eq!(fixture.sink().played().len(), 1);
    }

    #[tokio::test]
    async fn test_natural_end_advances() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B"]).await;

        fixture.sink().finish();
        let snapshot = wait_for(&session, |s| now_playing(s) == Some("B")).await;
        assert!(snapshot.queue.is_empty());

        fixture.sink().finish();
        let snapshot = wait_for(&session, |s| s.phase == PlayerPhase::Idle).await;
        assert!(snapshot.now_playing.is_none());
    }

    #[tokio::test]
    async fn test_skip_one() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B", "C"]).await;

        session.submit(Command::Skip(1));
        let snapshot = wait_for(&session, |s| now_playing(s) == Some("B")).await;
        assert_eq!(titles(&snapshot.queue), vec!["C"]);
    }

    #[tokio::test]
    async fn test_skip_zero_is_plain_skip() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B", "C"]).await;

        session.submit(Command::Skip(0));
        let snapshot = wait_for(&session, |s| now_playing(s) == Some("B")).await;
        assert_eq!(titles(&snapshot.queue), vec!["C"]);
    }

    #[tokio::test]
    async fn test_skip_three() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B", "C", "D"]).await;

        session.submit(Command::Skip(3));
        let snapshot = wait_for(&session, |s| now_playing(s) == Some("D")).await;
        assert!(snapshot.queue.is_empty());
    }

    #[tokio::test]
    async fn test_song_loop_replays_same_item() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B"]).await;
        session.submit(Command::SetLoopMode(LoopMode::Song));
        wait_for(&session, |s| s.loop_mode == LoopMode::Song).await;

        fixture.sink().finish();
        wait_for(&session, |_| fixture.sink().played().len() == 2).await;

        let snapshot = session.snapshot().await;
        assert_eq!(now_playing(&snapshot), Some("A"));
        assert_eq!(titles(&snapshot.queue), vec!["B"]);
    }

    #[tokio::test]
    async fn test_skip_overrides_song_loop() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B"]).await;
        session.submit(Command::SetLoopMode(LoopMode::Song));
        session.submit(Command::Skip(1));

        let snapshot = wait_for(&session, |s| now_playing(s) == Some("B")).await;
        assert!(snapshot.queue.is_empty());
        assert_eq!(snapshot.loop_mode, LoopMode::Song);
    }

    #[tokio::test]
    async fn test_queue_loop_requeues_finished_item() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B"]).await;
        session.submit(Command::SetLoopMode(LoopMode::Queue));
        wait_for(&session, |s| s.loop_mode == LoopMode::Queue).await;

        fixture.sink().finish();
        let snapshot = wait_for(&session, |s| now_playing(s) == Some("B")).await;
        assert_eq!(titles(&snapshot.queue), vec!["A"]);
    }

    #[tokio::test]
    async fn test_stop_clears_and_goes_idle_after_callback() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B", "C"]).await;

        session.submit(Command::Stop);
        let snapshot = wait_for(&session, |s| s.phase == PlayerPhase::Idle).await;
        assert!(snapshot.queue.is_empty());
        assert!(snapshot.now_playing.is_none());
        assert_eq!(fixture.sink().played().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_not_undone_by_queue_loop() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B"]).await;
        session.submit(Command::SetLoopMode(LoopMode::Queue));
        session.submit(Command::Stop);

        let snapshot = wait_for(&session, |s| s.phase == PlayerPhase::Idle).await;
        assert!(snapshot.queue.is_empty());
        assert_eq!(fixture.sink().played().len(), 1);
    }

    #[tokio::test]
    async fn test_all_failing_queue_terminates_idle() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["broken-1", "broken-2", "broken-3"]).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, PlayerPhase::Idle);
        assert!(snapshot.queue.is_empty());
        assert!(snapshot.now_playing.is_none());
        assert!(fixture.sink().played().is_empty());
    }

    #[tokio::test]
    async fn test_failing_items_are_skipped() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["broken-1", "B", "C"]).await;

        let snapshot = session.snapshot().await;
        assert_eq!(now_playing(&snapshot), Some("B"));
        assert_eq!(titles(&snapshot.queue), vec!["C"]);
    }

    #[tokio::test]
    async fn test_failing_song_loop_does_not_spin() {
        let fixture = Fixture::new();
        let session = fixture.session();
        session.submit(Command::SetLoopMode(LoopMode::Song));
        wait_for(&session, |s| s.loop_mode == LoopMode::Song).await;

        session.enqueue(vec![item("broken-1"), item("B")]).await.unwrap();
        session.wake_up().await;

        let snapshot = session.snapshot().await;
        assert_eq!(now_playing(&snapshot), Some("B"));
    }

    #[tokio::test]
    async fn test_pause_toggles() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A"]).await;

        session.submit(Command::TogglePause);
        wait_for(&session, |s| s.phase == PlayerPhase::Paused).await;
        assert!(fixture.sink().paused());

        session.submit(Command::TogglePause);
        wait_for(&session, |s| s.phase == PlayerPhase::Playing).await;
        assert!(!fixture.sink().paused());
    }

    #[tokio::test]
    async fn test_sink_failure_requeues_item() {
        let fixture = Fixture::new();
        fixture.sink().fail_next_play();
        let session = playing(&fixture, &["A", "B"]).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, PlayerPhase::Idle);
        assert!(snapshot.now_playing.is_none());
        assert_eq!(titles(&snapshot.queue), vec!["A", "B"]);

        session.wake_up().await;
        let snapshot = session.snapshot().await;
        assert_eq!(now_playing(&snapshot), Some("A"));
    }

    #[tokio::test]
    async fn test_wake_up_recovers_lost_callback() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B"]).await;

        fixture.sink().lose_track();
        session.wake_up().await;

        let snapshot = session.snapshot().await;
        assert_eq!(now_playing(&snapshot), Some("B"));
    }

    #[tokio::test]
    async fn test_wake_up_without_next_goes_idle() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A"]).await;

        fixture.sink().lose_track();
        session.wake_up().await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, PlayerPhase::Idle);
        assert!(snapshot.now_playing.is_none());
        assert!(snapshot.queue.is_empty());
    }

    #[tokio::test]
    async fn test_failed_stop_keeps_song_loop() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B"]).await;
        fixture.sink().fail_next_stop();

        session.submit(Command::Skip(1));
        session.submit(Command::SetLoopMode(LoopMode::Song));
        let snapshot = wait_for(&session, |s| s.loop_mode == LoopMode::Song).await;
        assert_eq!(now_playing(&snapshot), Some("A"));

        fixture.sink().finish();
        wait_for(&session, |_| fixture.sink().played().len() == 2).await;

        let snapshot = session.snapshot().await;
        assert_eq!(now_playing(&snapshot), Some("A"));
        assert_eq!(titles(&snapshot.queue), vec!["B"]);
    }

    #[tokio::test]
    async fn test_cross_catalog_item_without_match_is_dropped() {
        let fixture = Fixture::new();
        let session = fixture.session();
        session
            .enqueue(vec![cross_item("missing"), cross_item("B")])
            .await
            .unwrap();
        session.wake_up().await;

        let snapshot = session.snapshot().await;
        assert_eq!(now_playing(&snapshot), Some("B"));
        assert!(snapshot.queue.is_empty());
        assert_eq!(
            fixture.sink().played(),
            vec!["stream://https://media.test/B Uploader"]
        );
    }

    #[tokio::test]
    async fn test_stale_callback_is_ignored() {
        let fixture = Fixture::new();
        let session = playing(&fixture, &["A", "B", "C"]).await;
        let stale = session.finished_callback(0);

        fixture.sink().finish();
        wait_for(&session, |s| now_playing(s) == Some("B")).await;

        stale();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = session.snapshot().await;
        assert_eq!(now_playing(&snapshot), Some("B"));
        assert_eq!(titles(&snapshot.queue), vec!["C"]);
    }

    #[tokio::test]
    async fn test_notification_is_replaced_on_each_track() {
        let fixture = Fixture::new();
        let session = fixture.session();
        session.set_reply_channel_if_unset(ChannelId::new(10)).await;
        session.set_reply_channel_if_unset(ChannelId::new(11)).await;
        session.enqueue(vec![item("A"), item("B")]).await.unwrap();
        session.wake_up().await;

        fixture.sink().finish();
        wait_for(&session, |s| now_playing(s) == Some("B")).await;

        assert_eq!(
            fixture.notifier().events(),
            vec![
                NotifierEvent::Sent { channel: 10, message: 1, title: "A".into() },
                NotifierEvent::Deleted { message: 1 },
                NotifierEvent::Sent { channel: 10, message: 2, title: "B".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_notification_removed_externally_is_tolerated() {
        let fixture = Fixture::new();
        let session = fixture.session();
        session.set_reply_channel_if_unset(ChannelId::new(10)).await;
        session.enqueue(vec![item("A"), item("B")]).await.unwrap();
        session.wake_up().await;

        fixture.notifier().forget_all();
        fixture.sink().finish();
        let snapshot = wait_for(&session, |s| now_playing(s) == Some("B")).await;
        assert_eq!(snapshot.phase, PlayerPhase::Playing);
        assert_eq!(fixture.notifier().live_messages(), vec![2]);
    }
}
