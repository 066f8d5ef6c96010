use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::model::UserId;

/// Metadatos crudos de una canción tal como los devuelve el backend
/// al resolver una búsqueda.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackInfo {
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub uri: String,
    #[serde(default)]
    pub length_ms: u64,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub artwork_url: Option<String>,
}

/// Una canción lista para la cola: metadatos saneados + quien la pidió.
///
/// Inmutable una vez construida; la sesión la mueve entre la cola, el
/// puntero de reproducción y el historial sin modificarla.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    id: String,
    title: String,
    author: String,
    uri: String,
    duration_ms: u64,
    is_stream: bool,
    thumbnail: Option<String>,
    requester: UserId,
    #[allow(dead_code)]
    enqueued_at: DateTime<Utc>,
}

impl Track {
    /// Construye una canción a partir de la respuesta del backend,
    /// saneando el título y derivando la miniatura.
    pub fn from_info(info: TrackInfo, requester: UserId) -> Self {
        let thumbnail = derive_thumbnail(&info);

        Self {
            id: info.identifier,
            title: sanitize_title(&info.title),
            author: info.author,
            uri: info.uri,
            duration_ms: if info.is_stream { 0 } else { info.length_ms },
            is_stream: info.is_stream,
            thumbnail,
            requester,
            enqueued_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn is_stream(&self) -> bool {
        self.is_stream
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn requester(&self) -> UserId {
        self.requester
    }
}

/// Reemplaza los caracteres que rompen el formato de los embeds.
pub fn sanitize_title(text: &str) -> String {
    const REPLACES: &[(&str, &str)] = &[
        ("&quot;", "\""),
        ("&amp;", "&"),
        ("[", "【"),
        ("]", "】"),
        ("  ", " "),
        ("*", "\""),
        ("_", " "),
        ("{", "("),
        ("}", ")"),
    ];

    let mut text = text.to_string();
    for (from, to) in REPLACES {
        text = text.replace(from, to);
    }
    text
}

/// Recorta un texto a `limit` caracteres agregando puntos suspensivos.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let cut: String = text.chars().take(limit).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn derive_thumbnail(info: &TrackInfo) -> Option<String> {
    if let Some(artwork) = &info.artwork_url {
        if !artwork.is_empty() {
            return Some(artwork.clone());
        }
    }

    // Los tracks de youtube traen el id del video como identificador
    if info.uri.contains("youtube.com") || info.uri.contains("youtu.be") {
        return Some(format!(
            "https://img.youtube.com/vi/{}/mqdefault.jpg",
            info.identifier
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn info(title: &str, uri: &str) -> TrackInfo {
        TrackInfo {
            identifier: "dQw4w9WgXcQ".to_string(),
            title: title.to_string(),
            author: "Uploader".to_string(),
            uri: uri.to_string(),
            length_ms: 212_000,
            is_stream: false,
            artwork_url: None,
        }
    }

    #[test]
    fn test_sanitize_title_replacements() {
        assert_eq!(
            sanitize_title("A *bold* [Official_Video] &amp; more"),
            "A \"bold\" 【Official Video】 & more"
        );
    }

    #[test]
    fn test_truncate_adds_ellipsis() {
        assert_eq!(truncate("abcdef", 4), "abcd...");
        assert_eq!(truncate("abc", 4), "abc");
    }

    #[test]
    fn test_youtube_thumbnail_derived_from_id() {
        let track = Track::from_info(
            info("song", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            UserId(1),
        );
        assert_eq!(
            track.thumbnail(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );
    }

    #[test]
    fn test_non_youtube_without_artwork_has_no_thumbnail() {
        let track = Track::from_info(info("song", "https://soundcloud.com/x/y"), UserId(1));
        assert_eq!(track.thumbnail(), None);
    }

    #[test]
    fn test_stream_has_zero_duration() {
        let mut i = info("live", "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        i.is_stream = true;
        let track = Track::from_info(i, UserId(1));
        assert!(track.is_stream());
        assert_eq!(track.duration_ms(), 0);
    }
}
