//! # Backend Module
//!
//! Abstraction over the remote audio-processing service.
//!
//! The controller never touches the audio transport directly: everything it
//! needs from the backend goes through the [`AudioBackend`] trait (play,
//! stop, seek, filters, voice connection) and everything the backend tells
//! us back arrives as a [`BackendEvent`] routed by the
//! [`EventRouter`](crate::player::EventRouter).
//!
//! [`node`] manages the pool of backend nodes: health-probed registration
//! with bounded retries, load-based selection and operational statistics.

pub mod node;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::backend::node::NodeStats;
use crate::model::{ChannelId, GuildId};
use crate::player::track::{Track, TrackInfo};

static URL_REG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(?:www\.)?.+").expect("regex inválida"));

/// Operaciones que el controlador invoca sobre el backend de audio.
///
/// El transporte concreto (REST/websocket hacia un nodo lavalink-style)
/// queda fuera del núcleo; los errores se devuelven opacos y la sesión
/// los traduce a su propia taxonomía.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Vincula la sesión de un servidor a un canal de voz.
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<()>;

    /// Libera la sesión de voz del servidor.
    async fn disconnect(&self, guild: GuildId) -> Result<()>;

    /// Resuelve una búsqueda o URL en canciones reproducibles.
    async fn resolve_tracks(&self, query: &str) -> Result<LoadResult>;

    /// Comienza a reproducir la canción en la sesión del servidor.
    async fn play(&self, guild: GuildId, track: &Track) -> Result<()>;

    /// Detiene la canción actual (el backend emitirá `TrackEnded(Stopped)`).
    async fn stop(&self, guild: GuildId) -> Result<()>;

    async fn pause(&self, guild: GuildId, paused: bool) -> Result<()>;

    async fn seek(&self, guild: GuildId, position_ms: u64) -> Result<()>;

    async fn set_volume(&self, guild: GuildId, volume: u16) -> Result<()>;

    /// Aplica (o limpia) los filtros de audio de la sesión.
    async fn apply_filter(&self, guild: GuildId, filter: &FilterSpec) -> Result<()>;
}

/// Resultado de resolver una consulta en el backend.
#[derive(Debug, Clone)]
pub enum LoadResult {
    Tracks(Vec<TrackInfo>),
    Playlist(PlaylistInfo),
    Empty,
}

#[derive(Debug, Clone)]
pub struct PlaylistInfo {
    pub name: String,
    /// Índice de la canción seleccionada dentro de la playlist, si la hubo.
    pub selected: Option<usize>,
    pub tracks: Vec<TrackInfo>,
}

impl PlaylistInfo {
    /// Devuelve las canciones empezando por la seleccionada, rotando el
    /// resto al final (mismo orden que presenta la plataforma).
    pub fn ordered_tracks(mut self) -> Vec<TrackInfo> {
        if let Some(selected) = self.selected {
            if selected > 0 && selected < self.tracks.len() {
                self.tracks.rotate_left(selected);
            }
        }
        self.tracks
    }
}

/// Normaliza la consulta del usuario: quita los `<>` de supresión de
/// embeds y antepone el prefijo de búsqueda cuando no es una URL.
pub fn normalize_query(query: &str) -> String {
    let query = query.trim().trim_matches(|c| c == '<' || c == '>');

    if URL_REG.is_match(query) {
        query.to_string()
    } else {
        format!("ytsearch:{query}")
    }
}

/// Motivo con el que el backend reporta el fin de una canción.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndReason {
    Finished,
    Stopped,
    Replaced,
    Cleanup,
    LoadFailed,
}

/// Falla de reproducción reportada por el backend.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackError {
    pub message: String,
}

impl TrackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Errores estilo rate-limit: conviene reintentar la canción más
    /// tarde en vez de descartarla.
    pub fn is_rate_limited(&self) -> bool {
        self.message.contains("429")
    }
}

/// Evento asíncrono emitido por el backend hacia el controlador.
#[derive(Debug, Clone)]
pub struct BackendEvent {
    pub guild: GuildId,
    pub kind: BackendEventKind,
}

#[derive(Debug, Clone)]
pub enum BackendEventKind {
    TrackStarted,
    TrackEnded { reason: EndReason },
    TrackException { error: TrackError },
    SocketClosed { code: u16 },
    /// Estadísticas periódicas de un nodo (no pertenecen a una sesión).
    NodeStats { identifier: String, stats: NodeStats },
}

/// Códigos de cierre del socket de voz que el controlador distingue.
pub mod close_code {
    /// Cierre normal, nada que hacer.
    pub const NORMAL: u16 = 1000;
    /// Sesión de voz inválida: hay que renegociar la conexión.
    pub const SESSION_INVALID: u16 = 4006;
    /// El bot fue movido o expulsado del canal de voz.
    pub const DISCONNECTED: u16 = 4014;
}

/// Especificación de filtros del backend (subset timescale).
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timescale: Option<Timescale>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timescale {
    pub pitch: f64,
    pub speed: f64,
    pub rate: f64,
}

impl FilterSpec {
    /// Efecto nightcore: música acelerada con tono más agudo.
    pub fn nightcore() -> Self {
        Self {
            timescale: Some(Timescale {
                pitch: 1.2,
                speed: 1.1,
                rate: 1.0,
            }),
        }
    }

    /// Limpia todos los filtros.
    pub fn reset() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_query_prefixes_searches() {
        assert_eq!(normalize_query("never gonna"), "ytsearch:never gonna");
        assert_eq!(
            normalize_query("<https://youtu.be/abc>"),
            "https://youtu.be/abc"
        );
        assert_eq!(
            normalize_query("https://www.youtube.com/watch?v=abc"),
            "https://www.youtube.com/watch?v=abc"
        );
    }

    #[test]
    fn test_playlist_rotates_selected_track_first() {
        let playlist = PlaylistInfo {
            name: "mix".to_string(),
            selected: Some(2),
            tracks: vec![
                TrackInfo {
                    identifier: "a".into(),
                    title: "a".into(),
                    author: "x".into(),
                    uri: "https://e/a".into(),
                    length_ms: 1,
                    is_stream: false,
                    artwork_url: None,
                },
                TrackInfo {
                    identifier: "b".into(),
                    title: "b".into(),
                    author: "x".into(),
                    uri: "https://e/b".into(),
                    length_ms: 1,
                    is_stream: false,
                    artwork_url: None,
                },
                TrackInfo {
                    identifier: "c".into(),
                    title: "c".into(),
                    author: "x".into(),
                    uri: "https://e/c".into(),
                    length_ms: 1,
                    is_stream: false,
                    artwork_url: None,
                },
            ],
        };

        let ordered: Vec<String> = playlist
            .ordered_tracks()
            .into_iter()
            .map(|t| t.identifier)
            .collect();
        assert_eq!(ordered, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(TrackError::new("This IP address has been blocked by YouTube (429)")
            .is_rate_limited());
        assert!(!TrackError::new("Video unavailable").is_rate_limited());
    }

    #[test]
    fn test_nightcore_filter_shape() {
        let spec = FilterSpec::nightcore();
        let ts = spec.timescale.unwrap();
        assert_eq!(ts.pitch, 1.2);
        assert_eq!(ts.speed, 1.1);
        assert_eq!(ts.rate, 1.0);
        assert_eq!(FilterSpec::reset().timescale, None);
    }
}
