use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{ResolvedTrack, TrackQuery, TrackResolver};
use crate::audio::error::PlaybackError;

/// Resolver basado en `yt-dlp --dump-single-json`.
pub struct YtDlpResolver {
    binary: String,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp. Las búsquedas y playlists traen `entries`.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    url: Option<String>,
    entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, concurrency: usize) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(concurrency.max(1)),
        }
    }

    fn target(query: &TrackQuery) -> String {
        match query {
            TrackQuery::Search(text) => format!("ytsearch1:{}", text),
            TrackQuery::Url(url) => url.clone(),
        }
    }

    /// Toma la primera entrada si es una colección; sin URL de stream no hay track.
    fn parse_output(stdout: &str) -> Result<ResolvedTrack> {
        let mut info: YtDlpInfo =
            serde_json::from_str(stdout.trim()).context("Error al parsear respuesta de yt-dlp")?;

        if let Some(entries) = info.entries.take() {
            info = entries
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("No se encontraron resultados"))?;
        }

        let stream_ref = info
            .url
            .ok_or_else(|| anyhow::anyhow!("yt-dlp no devolvió una URL de stream"))?;
        let title = info.title.unwrap_or_else(|| "Sin título".to_string());

        Ok(ResolvedTrack { stream_ref, title })
    }

    async fn run(&self, query: &TrackQuery) -> Result<ResolvedTrack> {
        let _permit = self.rate_limiter.acquire().await?;
        let target = Self::target(query);

        debug!("📊 Ejecutando yt-dlp para: {}", target);

        // Si el controlador abandona la resolución (timeout), el proceso muere con el future
        let output = Command::new(&self.binary)
            .kill_on_drop(true)
            .args([
                "--dump-single-json",
                "--no-playlist",
                "--no-warnings",
                "--format",
                "bestaudio/best",
                target.as_str(),
            ])
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Self::parse_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Verifica que yt-dlp esté disponible; devuelve la versión
    pub async fn verify(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .kill_on_drop(true)
            .arg("--version")
            .output()
            .await
            .context("yt-dlp no está instalado o no está en PATH")?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp no puede ejecutarse correctamente");
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &TrackQuery) -> Result<ResolvedTrack, PlaybackError> {
        info!("🔍 Resolviendo: {}", query.as_str());

        let track = self
            .run(query)
            .await
            .map_err(|e| PlaybackError::resolution(query.as_str(), format!("{:#}", e)))?;

        info!("✅ Resuelto: {}", track.title);
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_target_uses_first_result() {
        assert_eq!(
            YtDlpResolver::target(&TrackQuery::Search("lofi beats".into())),
            "ytsearch1:lofi beats"
        );
        assert_eq!(
            YtDlpResolver::target(&TrackQuery::Url("https://youtu.be/abc".into())),
            "https://youtu.be/abc"
        );
    }

    #[test]
    fn test_parse_single_video() {
        let json = r#"{"id":"abc","title":"Song","url":"https://cdn.test/abc.webm","duration":200}"#;
        assert_eq!(
            YtDlpResolver::parse_output(json).unwrap(),
            ResolvedTrack {
                stream_ref: "https://cdn.test/abc.webm".into(),
                title: "Song".into(),
            }
        );
    }

    #[test]
    fn test_parse_search_takes_first_entry() {
        let json = r#"{"_type":"playlist","title":"lofi","entries":[
            {"title":"First","url":"https://cdn.test/1"},
            {"title":"Second","url":"https://cdn.test/2"}
        ]}"#;
        let track = YtDlpResolver::parse_output(json).unwrap();
        assert_eq!(track.title, "First");
        assert_eq!(track.stream_ref, "https://cdn.test/1");
    }

    #[test]
    fn test_parse_empty_search_fails() {
        let json = r#"{"_type":"playlist","entries":[]}"#;
        assert!(YtDlpResolver::parse_output(json).is_err());
    }

    #[test]
    fn test_parse_without_stream_url_fails() {
        assert!(YtDlpResolver::parse_output(r#"{"title":"No formats"}"#).is_err());
        assert!(YtDlpResolver::parse_output("not json").is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_abandoned_resolution_kills_ytdlp() {
        use std::{os::unix::fs::PermissionsExt, time::Duration};

        let dir = std::env::temp_dir().join(format!("guild-tunes-ytdlp-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let pid_file = dir.join("pid");
        let script = dir.join("yt-dlp");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > {}\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = YtDlpResolver::new(script.to_string_lossy(), 1);
        let query = TrackQuery::Search("lento".into());
        let result = tokio::time::timeout(Duration::from_secs(1), resolver.resolve(&query)).await;
        assert!(result.is_err(), "yt-dlp falso no debería terminar solo");

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let status_path = format!("/proc/{}/status", pid.trim());
        let mut killed = false;
        for _ in 0..100 {
            match std::fs::read_to_string(&status_path) {
                Err(_) => killed = true,
                Ok(status) => {
                    killed = status
                        .lines()
                        .any(|line| line.starts_with("State:") && line.contains('Z'))
                }
            }
            if killed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let _ = std::fs::remove_dir_all(&dir);
        assert!(killed, "el proceso {} sigue vivo", pid.trim());
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_resolution_error() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp", 1);
        let err = resolver
            .resolve(&TrackQuery::Search("anything".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Resolution { .. }));
    }
}
