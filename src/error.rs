use thiserror::Error;

/// Errores de dominio del reproductor.
///
/// Estas son las condiciones que el núcleo puede detectar por sí mismo
/// (cola vacía, índice inválido, canción inexistente). Las validaciones
/// previas (permisos, cooldowns, presencia en el canal de voz) son
/// responsabilidad de la capa de comandos y se reportan con
/// [`CommandRejection`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("no hay un reproductor activo en este servidor")]
    NoActiveSession,

    #[error("no hay ninguna canción reproduciéndose")]
    NoCurrentTrack,

    #[error("no hay canciones en la cola")]
    QueueEmpty,

    #[error("la cola necesita al menos {min} canciones")]
    QueueTooSmall { min: usize },

    #[error("la posición {index} no existe en la cola (tamaño actual: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no hay canciones en la cola con el nombre: {query}")]
    TrackNotFound { query: String },

    #[error("posición inválida")]
    InvalidPosition,

    #[error("no hay canciones tocadas para readicionar")]
    HistoryEmpty,

    #[error("no hay servidores de música disponibles")]
    NoNodeAvailable,

    #[error("el backend de audio no está disponible")]
    BackendUnavailable,
}

/// Rechazos de la capa de comandos, previos a invocar el núcleo.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejection {
    #[error("debes estar en la lista de DJ o tener permiso de gestionar canales")]
    PermissionDenied,

    #[error("debes usar un valor entre {min} y {max}")]
    VolumeOutOfRange { min: u16, max: u16 },
}
