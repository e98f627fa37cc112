pub mod ytdlp;

use async_trait::async_trait;
use url::Url;

use crate::audio::error::PlaybackError;

pub use ytdlp::YtDlpResolver;

/// Lo que escribió el usuario, ya clasificado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackQuery {
    /// Texto libre: se busca y se toma el primer resultado
    Search(String),
    /// URL directa, se pasa tal cual
    Url(String),
}

impl TrackQuery {
    pub fn parse(raw: &str) -> Result<Self, PlaybackError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PlaybackError::precondition(
                "❌ Debes indicar el nombre de una canción o una URL. Ejemplo: `/play Never Gonna Give You Up`",
            ));
        }

        if Self::is_url(trimmed) {
            Ok(TrackQuery::Url(trimmed.to_string()))
        } else {
            Ok(TrackQuery::Search(trimmed.to_string()))
        }
    }

    fn is_url(candidate: &str) -> bool {
        Url::parse(candidate)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
            .unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TrackQuery::Search(text) | TrackQuery::Url(text) => text,
        }
    }
}

/// Stream listo para entregar a la sesión de voz
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub stream_ref: String,
    pub title: String,
}

/// Convierte una búsqueda o URL en un stream reproducible
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &TrackQuery) -> Result<ResolvedTrack, PlaybackError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_a_search() {
        assert_eq!(
            TrackQuery::parse("  never gonna give you up ").unwrap(),
            TrackQuery::Search("never gonna give you up".to_string())
        );
    }

    #[test]
    fn test_urls_pass_through_verbatim() {
        let raw = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42";
        assert_eq!(TrackQuery::parse(raw).unwrap(), TrackQuery::Url(raw.to_string()));
        assert!(matches!(
            TrackQuery::parse("http://radio.example.com/stream.mp3").unwrap(),
            TrackQuery::Url(_)
        ));
    }

    #[test]
    fn test_non_http_schemes_are_searched() {
        assert!(matches!(TrackQuery::parse("ftp://example.com/song.mp3").unwrap(), TrackQuery::Search(_)));
        assert!(matches!(TrackQuery::parse("http stuff").unwrap(), TrackQuery::Search(_)));
    }

    #[test]
    fn test_empty_query_is_rejected() {
        assert!(matches!(TrackQuery::parse("   "), Err(PlaybackError::Precondition(_))));
    }
}
