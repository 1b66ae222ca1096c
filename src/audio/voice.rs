use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use super::sink::{AudioSink, FinishedCallback, SinkFactory};
use crate::error::{MusicError, Result};

/// Sink sobre la llamada de songbird de un guild
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    guild_id: GuildId,
    volume: f32,
    track: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client, guild_id: GuildId, volume: f32) -> Self {
        Self {
            manager,
            http,
            guild_id,
            volume,
            track: Mutex::new(None),
        }
    }

    fn current_track(&self) -> Result<TrackHandle> {
        self.track
            .lock()
            .clone()
            .ok_or_else(|| MusicError::Sink("no hay track activo".to_string()))
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.track.lock().clone()?;
        track.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn play(&self, source: &str, on_finished: FinishedCallback) -> Result<()> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or_else(|| MusicError::Sink(format!("sin conexión de voz en guild {}", self.guild_id)))?;

        let input: Input = HttpRequest::new(self.http.clone(), source.to_string()).into();

        let track = {
            let mut handler = call.lock().await;
            handler.play_only_input(input)
        };

        if let Err(e) = track.set_volume(self.volume) {
            warn!("⚠️ No se pudo ajustar el volumen: {}", e);
        }

        // Fin y error comparten el mismo callback de un solo uso
        let finished = TrackFinished {
            callback: Arc::new(Mutex::new(Some(on_finished))),
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(Event::Track(event), finished.clone())
                .map_err(|e| MusicError::Sink(format!("Error al agregar event handler: {}", e)))?;
        }

        *self.track.lock() = Some(track);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.current_track()?
            .pause()
            .map_err(|e| MusicError::Sink(e.to_string()))
    }

    async fn resume(&self) -> Result<()> {
        self.current_track()?
            .play()
            .map_err(|e| MusicError::Sink(e.to_string()))
    }

    async fn stop(&self) -> Result<()> {
        self.current_track()?
            .stop()
            .map_err(|e| MusicError::Sink(e.to_string()))
    }

    async fn is_playing(&self) -> bool {
        self.play_mode().await == Some(PlayMode::Play)
    }

    async fn is_paused(&self) -> bool {
        self.play_mode().await == Some(PlayMode::Pause)
    }
}

#[derive(Clone)]
struct TrackFinished {
    callback: Arc<Mutex<Option<FinishedCallback>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackFinished {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let callback = self.callback.lock().take();
        if let Some(callback) = callback {
            debug!("🏁 Track terminado, avisando a la sesión");
            callback();
        }
        None
    }
}

/// Crea un [`SongbirdSink`] por guild, compartiendo el cliente HTTP
pub struct SongbirdSinkFactory {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    volume: f32,
}

impl SongbirdSinkFactory {
    pub fn new(manager: Arc<Songbird>, volume: f32) -> Result<Self> {
        // Sin timeout total: el stream dura lo que dure el track
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MusicError::Sink(format!("cliente HTTP: {}", e)))?;

        Ok(Self { manager, http, volume })
    }
}

impl SinkFactory for SongbirdSinkFactory {
    fn sink_for(&self, guild_id: GuildId) -> Arc<dyn AudioSink> {
        Arc::new(SongbirdSink::new(
            Arc::clone(&self.manager),
            self.http.clone(),
            guild_id,
            self.volume,
        ))
    }
}
