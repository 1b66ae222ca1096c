use async_trait::async_trait;
use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::debug;

use crate::{
    audio::{
        queue::PlayableItem,
        sink::{NotificationHandle, Notifier},
    },
    error::{MusicError, Result},
    ui::embeds::create_now_playing_embed,
};

/// Publica el "reproduciendo ahora" en el canal de texto del guild
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send_now_playing(&self, channel_id: ChannelId, item: &PlayableItem) -> Result<NotificationHandle> {
        let message = channel_id
            .send_message(&self.http, CreateMessage::new().embed(create_now_playing_embed(item)))
            .await
            .map_err(|e| MusicError::Notification(e.to_string()))?;

        Ok(NotificationHandle {
            channel_id,
            message_id: message.id,
        })
    }

    async fn delete(&self, handle: NotificationHandle) {
        // El mensaje pudo haber sido borrado a mano
        if let Err(e) = handle
            .channel_id
            .delete_message(&self.http, handle.message_id)
            .await
        {
            debug!("🗑️ No se pudo borrar la notificación {}: {}", handle.message_id, e);
        }
    }
}
