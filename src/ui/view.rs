use crate::model::{ChannelId, UserId};
use crate::player::queue::LoopMode;
use crate::player::track::Track;

/// Modelo de vista del estado de una sesión, listo para que el
/// renderizador externo lo convierta en UI de la plataforma.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub now_playing: Option<NowPlaying>,
    pub paused: bool,
    pub volume: u16,
    pub loop_mode: LoopMode,
    pub nightcore: bool,
    pub restrict_mode: bool,
    pub queue_len: usize,
    /// Próximas canciones (acotado por la configuración, normalmente 3).
    pub upcoming: Vec<UpcomingEntry>,
    /// Cuántas canciones quedan además de las del adelanto.
    pub overflow: usize,
    /// Última interacción registrada por la capa de comandos.
    pub command_log: Option<(UserId, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub title: String,
    pub author: String,
    pub uri: String,
    pub duration_label: String,
    pub thumbnail: Option<String>,
    pub requester: UserId,
}

impl NowPlaying {
    pub fn from_track(track: &Track) -> Self {
        Self {
            title: track.title().to_string(),
            author: track.author().to_string(),
            uri: track.uri().to_string(),
            duration_label: duration_label(track),
            thumbnail: track.thumbnail().map(str::to_string),
            requester: track.requester(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingEntry {
    pub title: String,
    pub uri: String,
    pub duration_label: String,
}

impl UpcomingEntry {
    pub fn from_track(track: &Track) -> Self {
        Self {
            title: track.title().to_string(),
            uri: track.uri().to_string(),
            duration_label: duration_label(track),
        }
    }
}

/// Avisos fuera del mensaje de estado (errores, desconexiones, inactividad).
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Falla de reproducción reportada por el backend.
    PlaybackFailed {
        title: String,
        uri: String,
        error: String,
    },
    /// Conexión de voz perdida; el reproductor se apaga.
    ConnectionLost { channel: Option<ChannelId> },
    /// La cola quedó vacía; cuenta regresiva hasta el apagado.
    IdleCountdown { timeout_label: String },
    /// Apagado por inactividad.
    IdleShutdown,
}

fn duration_label(track: &Track) -> String {
    if track.is_stream() {
        "🔴 Livestream".to_string()
    } else {
        time_format(track.duration_ms())
    }
}

/// Formatea milisegundos como `mm:ss` (o `h:mm:ss` al superar la hora).
pub fn time_format(milliseconds: u64) -> String {
    let total = milliseconds / 1000;
    let (h, rem) = (total / 3600, total % 3600);
    let (m, s) = (rem / 60, rem % 60);

    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Parsea una posición escrita por el usuario (`90`, `1:30`) a
/// milisegundos; lo negativo se trunca a 0.
pub fn parse_position(input: &str) -> Option<u64> {
    let parts: Vec<&str> = input.trim().split(':').collect();

    let seconds: i64 = match parts.as_slice() {
        [secs] => secs.trim().parse().ok()?,
        [mins, secs] => {
            let m: i64 = mins.trim().parse().ok()?;
            let s: i64 = secs.trim().parse().ok()?;
            m * 60 + s
        }
        _ => return None,
    };

    Some(seconds.max(0) as u64 * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_time_format() {
        assert_eq!(time_format(0), "00:00");
        assert_eq!(time_format(65_000), "01:05");
        assert_eq!(time_format(3_723_000), "1:02:03");
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("90"), Some(90_000));
        assert_eq!(parse_position("1:10"), Some(70_000));
        assert_eq!(parse_position("0:25"), Some(25_000));
        assert_eq!(parse_position("-30"), Some(0));
        assert_eq!(parse_position("abc"), None);
        assert_eq!(parse_position("1:2:3"), None);
    }
}
