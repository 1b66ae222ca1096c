use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::sync::Arc;

use super::queue::PlayableItem;
use crate::error::Result;

/// Se invoca una sola vez cuando el track termina (o falla), desde el
/// contexto de ejecución del backend de audio.
pub type FinishedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Salida de audio de un guild
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Empieza a reproducir `source`, reemplazando lo que sonaba
    async fn play(&self, source: &str, on_finished: FinishedCallback) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    /// Detiene el track actual; su callback de fin se dispara igualmente
    async fn stop(&self) -> Result<()>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;
}

/// Entrega el sink asociado a la conexión de voz de un guild
pub trait SinkFactory: Send + Sync {
    fn sink_for(&self, guild_id: GuildId) -> Arc<dyn AudioSink>;
}

/// Referencia a un mensaje "reproduciendo ahora" ya enviado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationHandle {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_now_playing(&self, channel_id: ChannelId, item: &PlayableItem) -> Result<NotificationHandle>;

    /// Borra una notificación; si ya no existe no es un error
    async fn delete(&self, handle: NotificationHandle);
}

/// Precondición de voz para los comandos de control
#[async_trait]
pub trait VoiceGate: Send + Sync {
    async fn guarantee(&self, guild_id: GuildId, user_id: UserId) -> Result<()>;
}
