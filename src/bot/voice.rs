use async_trait::async_trait;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId, UserId},
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::sink::VoiceGate,
    error::{MusicError, Result},
};

/// Verifica el canal de voz del usuario contra el del bot, conectando el bot
/// si todavía no está en ninguno.
pub struct SongbirdGate {
    cache: Arc<Cache>,
    manager: Arc<Songbird>,
}

impl SongbirdGate {
    pub fn new(cache: Arc<Cache>, manager: Arc<Songbird>) -> Self {
        Self { cache, manager }
    }

    fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        let guild = self.cache.guild(guild_id)?;
        guild.voice_states.get(&user_id).and_then(|state| state.channel_id)
    }

    async fn bot_channel(&self, guild_id: GuildId) -> Option<songbird::id::ChannelId> {
        let call = self.manager.get(guild_id)?;
        let handler = call.lock().await;
        handler.current_channel()
    }
}

#[async_trait]
impl VoiceGate for SongbirdGate {
    async fn guarantee(&self, guild_id: GuildId, user_id: UserId) -> Result<()> {
        let user_channel = self
            .user_channel(guild_id, user_id)
            .ok_or(MusicError::UserNotInVoiceSession)?;

        match self.bot_channel(guild_id).await {
            Some(bot_channel) if bot_channel == songbird::id::ChannelId::from(user_channel) => Ok(()),
            Some(_) => Err(MusicError::WrongSession),
            None => {
                self.manager
                    .join(guild_id, user_channel)
                    .await
                    .map_err(|e| MusicError::Sink(format!("Error al conectar al canal de voz: {}", e)))?;
                info!("🔊 Conectado al canal de voz {} en guild {}", user_channel, guild_id);
                Ok(())
            }
        }
    }
}
