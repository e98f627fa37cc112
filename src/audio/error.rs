//! Errores de las operaciones de reproducción.
//!
//! Todos se convierten en un [`Reply`] en el borde de la operación; ninguno
//! debe tumbar el proceso ni dejar el estado de una guild a medio mutar.

use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::audio::reply::Reply;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// El resolver no encontró nada o falló
    #[error("no se pudo resolver '{query}': {reason}")]
    Resolution { query: String, reason: String },

    /// La conexión al canal de voz superó el límite
    #[error("conexión al canal de voz superó {0:?}")]
    ConnectionTimeout(Duration),

    /// Uso incorrecto: sin sesión, nada sonando, no pausado, cola llena...
    #[error("{0}")]
    Precondition(String),

    #[error("error inesperado: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl PlaybackError {
    pub fn resolution(query: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            query: query.into(),
            reason: reason.to_string(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Mensaje para el usuario. Los errores inesperados se loguean con detalle.
    pub fn to_reply(&self) -> Reply {
        match self {
            PlaybackError::Resolution { .. } => Reply::error(
                "❌ No se pudo encontrar la canción o el formato no es compatible. Prueba con otras palabras o una URL.",
            ),
            PlaybackError::ConnectionTimeout(_) => {
                Reply::error("❌ Tiempo de espera agotado al conectar al canal de voz, inténtalo de nuevo.")
            }
            PlaybackError::Precondition(message) => Reply::error(message.clone()),
            PlaybackError::Unexpected(e) => {
                error!("Error inesperado en reproducción: {:?}", e);
                Reply::error("❌ Ocurrió un error inesperado, revisa los logs del bot.")
            }
        }
    }
}
