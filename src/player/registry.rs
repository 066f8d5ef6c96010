use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use crate::backend::AudioBackend;
use crate::config::Settings;
use crate::error::PlayerError;
use crate::model::GuildId;
use crate::player::session::{PlayerSession, SessionOptions};
use crate::ui::display::DisplayRenderer;

/// Mapa explícito de tenant a sesión, con creación y destrucción como
/// operaciones de primera clase (nada de sesiones implícitas).
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<PlayerSession>>,
    backend: Arc<dyn AudioBackend>,
    renderer: Arc<dyn DisplayRenderer>,
    settings: Arc<Settings>,
}

impl SessionRegistry {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        renderer: Arc<dyn DisplayRenderer>,
        settings: Arc<Settings>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            backend,
            renderer,
            settings,
        })
    }

    /// Sesión existente del servidor, o `NoActiveSession`.
    pub fn get(&self, guild: GuildId) -> Result<Arc<PlayerSession>, PlayerError> {
        self.lookup(guild).ok_or(PlayerError::NoActiveSession)
    }

    /// Búsqueda silenciosa (para el ruteo de eventos).
    pub fn lookup(&self, guild: GuildId) -> Option<Arc<PlayerSession>> {
        self.sessions.get(&guild).map(|s| Arc::clone(s.value()))
    }

    /// Devuelve la sesión del servidor, creándola en el primer pedido
    /// de reproducción.
    pub fn get_or_create(
        self: &Arc<Self>,
        guild: GuildId,
        options: SessionOptions,
    ) -> Arc<PlayerSession> {
        self.sessions
            .entry(guild)
            .or_insert_with(|| {
                info!("🆕 Creando sesión para guild {}", guild);
                PlayerSession::new(
                    guild,
                    options,
                    Arc::clone(&self.backend),
                    Arc::clone(&self.renderer),
                    Arc::clone(&self.settings),
                    Arc::downgrade(self),
                )
            })
            .clone()
    }

    /// Apaga y remueve la sesión del servidor.
    pub async fn destroy(&self, guild: GuildId) -> Result<(), PlayerError> {
        let session = self.get(guild)?;
        session.destroy().await;
        Ok(())
    }

    pub(crate) fn remove(&self, guild: GuildId) {
        if self.sessions.remove(&guild).is_some() {
            info!("🗑️ Sesión de guild {} removida del registro", guild);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{permissive_backend, session_options, RecordingRenderer};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn registry() -> Arc<SessionRegistry> {
        SessionRegistry::new(
            Arc::new(permissive_backend()),
            RecordingRenderer::new(),
            Arc::new(Settings::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_create_reuses_session() {
        let registry = registry();
        let a = registry.get_or_create(GuildId(1), session_options());
        let b = registry.get_or_create(GuildId(1), session_options());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        registry.get_or_create(GuildId(2), session_options());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_without_session_fails() {
        let registry = registry();
        assert!(matches!(
            registry.get(GuildId(9)),
            Err(PlayerError::NoActiveSession)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_removes_session_from_registry() {
        let registry = registry();
        let session = registry.get_or_create(GuildId(1), session_options());

        registry.destroy(GuildId(1)).await.unwrap();

        assert!(session.is_destroyed());
        assert!(registry.is_empty());
        assert!(matches!(
            registry.destroy(GuildId(1)).await,
            Err(PlayerError::NoActiveSession)
        ));
    }
}
