use async_trait::async_trait;
use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::error;

use crate::{
    audio::reply::{Notifier, Reply},
    ui::embeds,
};

/// Publica los anuncios del controlador en el canal de texto de la guild
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
    async fn notify(&self, channel_id: ChannelId, reply: Reply) {
        let message = CreateMessage::new().embed(embeds::reply_embed(&reply));

        if let Err(e) = channel_id.send_message(&self.http, message).await {
            error!("Error al enviar mensaje al canal {}: {:?}", channel_id, e);
        }
    }
}
