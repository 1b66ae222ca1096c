//! # Bot Module
//!
//! Discord side of Open Jukebox: gateway events, the voice precondition check
//! and the channel notifier used by the playback sessions.
//!
//! Command registration and dispatch live outside this crate. They reach the
//! orchestrator through the [`AudioPlayer`] stored in the client's `TypeMap`
//! under [`PlayerKey`].

use serenity::{
    all::{Context, EventHandler, Ready, VoiceState},
    async_trait,
    prelude::TypeMapKey,
};
use std::sync::Arc;
use tracing::info;

pub mod notifier;
pub mod voice;

pub use notifier::ChannelNotifier;
pub use voice::SongbirdGate;

use crate::audio::player::AudioPlayer;

/// Clave del `TypeMap` bajo la que vive el reproductor
pub struct PlayerKey;

impl TypeMapKey for PlayerKey {
    type Value = Arc<AudioPlayer>;
}

/// Obtiene el reproductor registrado en el cliente
pub async fn player(ctx: &Context) -> Option<Arc<AudioPlayer>> {
    ctx.data.read().await.get::<PlayerKey>().cloned()
}

/// Handler de eventos del gateway
pub struct OpenJukebox;

#[async_trait]
impl EventHandler for OpenJukebox {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
    }

    /// Si el bot fue desconectado del canal de voz, la sesión se detiene
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Bot desconectado en guild {}", guild_id);
        if let Some(player) = player(&ctx).await {
            player.stop(guild_id);
        }
    }
}
