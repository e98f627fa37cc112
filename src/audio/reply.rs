use async_trait::async_trait;
use serenity::model::id::ChannelId;

/// Resultado que produce cada operación del controlador.
///
/// El controlador nunca arma contenido específico de Discord; la capa de
/// comandos decide cómo mostrarlo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
}

impl Reply {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ReplyKind::Error
    }
}

/// Mensajes que no responden a un comando (p. ej. la siguiente canción de la cola).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel_id: ChannelId, reply: Reply);
}
