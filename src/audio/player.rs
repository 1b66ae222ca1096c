use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{sync::Arc, time::Duration};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::{
    audio::{
        commands::Command,
        queue::{LoopMode, PlayableItem, QueuePage},
        session::{PlayerPhase, SessionSnapshot, TenantSession},
        sink::{Notifier, SinkFactory, VoiceGate},
    },
    config::Config,
    error::Result,
    sources::{MediaResolver, ResolvedBatch},
};

/// Orquestador de reproducción: una sesión por guild, creada bajo demanda.
pub struct AudioPlayer {
    sessions: DashMap<GuildId, Arc<TenantSession>>,
    resolver: MediaResolver,
    sinks: Arc<dyn SinkFactory>,
    notifier: Arc<dyn Notifier>,
    gate: Option<Arc<dyn VoiceGate>>,
    max_queue_size: usize,
    queue_page_size: usize,
    runtime: Handle,
}

impl AudioPlayer {
    /// # Panics
    ///
    /// Si se llama fuera de un runtime de tokio.
    pub fn new(
        config: &Config,
        resolver: MediaResolver,
        sinks: Arc<dyn SinkFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            resolver,
            sinks,
            notifier,
            gate: None,
            max_queue_size: config.max_queue_size,
            queue_page_size: config.queue_page_size,
            runtime: Handle::current(),
        }
    }

    /// Verificación de canal de voz previa a los comandos
    pub fn with_voice_gate(mut self, gate: Arc<dyn VoiceGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Obtiene o crea la sesión del guild
    pub fn session(&self, guild_id: GuildId) -> Arc<TenantSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                TenantSession::new(
                    guild_id,
                    self.max_queue_size,
                    Arc::clone(self.resolver.providers()),
                    self.sinks.sink_for(guild_id),
                    Arc::clone(&self.notifier),
                    self.runtime.clone(),
                )
            })
            .clone()
    }

    pub fn guild_count(&self) -> usize {
        self.sessions.len()
    }

    /// El usuario debe estar en un canal de voz, y en el mismo que el bot
    pub async fn guarantee(&self, guild_id: GuildId, user_id: UserId) -> Result<()> {
        match &self.gate {
            Some(gate) => gate.guarantee(guild_id, user_id).await,
            None => Ok(()),
        }
    }

    /// Resuelve la entrada y la agrega a la cola del guild
    pub async fn enqueue(&self, guild_id: GuildId, raw: &str, requester: UserId) -> Result<ResolvedBatch> {
        let resolved = self.resolver.interpret(raw, requester).await?;
        let added = self.session(guild_id).enqueue(resolved.items).await?;
        info!("➕ Agregado a la cola de guild {}: {} track(s)", guild_id, added.len());
        Ok(ResolvedBatch::new(added))
    }

    /// Agrega a la cola y arranca la reproducción si estaba parada
    pub async fn play(
        &self,
        guild_id: GuildId,
        reply_channel: ChannelId,
        raw: &str,
        requester: UserId,
    ) -> Result<ResolvedBatch> {
        self.session(guild_id).set_reply_channel_if_unset(reply_channel).await;
        let batch = self.enqueue(guild_id, raw, requester).await?;
        self.wake_up(guild_id).await;
        Ok(batch)
    }

    pub async fn wake_up(&self, guild_id: GuildId) {
        self.session(guild_id).wake_up().await;
    }

    /// Pausa o reanuda
    pub fn pause(&self, guild_id: GuildId) {
        self.session(guild_id).submit(Command::TogglePause);
    }

    /// Salta `count` tracks (mínimo 1)
    pub fn skip(&self, guild_id: GuildId, count: usize) {
        self.session(guild_id).submit(Command::Skip(count.max(1)));
    }

    /// Limpia la cola y detiene la reproducción
    pub fn stop(&self, guild_id: GuildId) {
        self.session(guild_id).submit(Command::Stop);
    }

    pub fn set_loop_mode(&self, guild_id: GuildId, mode: LoopMode) {
        self.session(guild_id).submit(Command::SetLoopMode(mode));
    }

    /// Página de la cola (base 0), acotada a las páginas existentes
    pub async fn peek_queue(&self, guild_id: GuildId, page: usize) -> QueuePage {
        debug!("📋 Página {} de la cola de guild {}", page, guild_id);
        self.session(guild_id).page(page, self.queue_page_size).await
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> SessionSnapshot {
        self.session(guild_id).snapshot().await
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<PlayableItem> {
        self.snapshot(guild_id).await.now_playing
    }

    pub async fn loop_mode(&self, guild_id: GuildId) -> LoopMode {
        self.snapshot(guild_id).await.loop_mode
    }

    pub async fn is_paused(&self, guild_id: GuildId) -> bool {
        self.snapshot(guild_id).await.phase == PlayerPhase::Paused
    }

    /// Duración de lo que queda en cola, sin el track actual
    pub async fn queue_duration(&self, guild_id: GuildId) -> Duration {
        self.snapshot(guild_id).await.queue_duration()
    }
}
