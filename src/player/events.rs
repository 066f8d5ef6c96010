use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::backend::node::NodePool;
use crate::backend::{BackendEvent, BackendEventKind};
use crate::player::registry::SessionRegistry;

/// Despacha los eventos asíncronos del backend a la sesión dueña.
///
/// Los handlers de sesión reutilizan la misma disciplina de transición
/// que los comandos de usuario, así que acá no hay más lógica que el
/// ruteo: buscar la sesión y entregarle el evento.
pub struct EventRouter {
    registry: Arc<SessionRegistry>,
    pool: Arc<NodePool>,
    events: mpsc::UnboundedReceiver<BackendEvent>,
}

impl EventRouter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        pool: Arc<NodePool>,
        events: mpsc::UnboundedReceiver<BackendEvent>,
    ) -> Self {
        Self {
            registry,
            pool,
            events,
        }
    }

    /// Canal por el que el transporte del backend publica sus eventos.
    pub fn channel() -> (
        mpsc::UnboundedSender<BackendEvent>,
        mpsc::UnboundedReceiver<BackendEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    /// Consume eventos hasta que el transporte cierre el canal.
    pub async fn run(mut self) {
        info!("📡 Router de eventos iniciado");
        while let Some(event) = self.events.recv().await {
            self.dispatch(event).await;
        }
        info!("📡 Router de eventos terminado");
    }

    async fn dispatch(&self, event: BackendEvent) {
        // Las estadísticas de nodo no pertenecen a ninguna sesión
        if let BackendEventKind::NodeStats { identifier, stats } = &event.kind {
            self.pool.record_stats(identifier, stats.clone());
            return;
        }

        let Some(session) = self.registry.lookup(event.guild) else {
            debug!("📭 Evento para guild {} sin sesión, descartado", event.guild);
            return;
        };

        match event.kind {
            BackendEventKind::TrackStarted => session.on_track_started().await,
            BackendEventKind::TrackEnded { reason } => session.on_track_ended(reason).await,
            BackendEventKind::TrackException { error } => {
                session.on_track_exception(&error).await
            }
            BackendEventKind::SocketClosed { code } => session.on_socket_closed(code).await,
            BackendEventKind::NodeStats { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::node::NodeStats;
    use crate::backend::EndReason;
    use crate::config::Settings;
    use crate::model::GuildId;
    use crate::testkit::{permissive_backend, session_options, track, RecordingRenderer};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_events_reach_the_owning_session() {
        let settings = std::sync::Arc::new(Settings::default());
        let registry = SessionRegistry::new(
            std::sync::Arc::new(permissive_backend()),
            RecordingRenderer::new(),
            settings.clone(),
        );
        let pool = NodePool::new(settings);
        let (tx, rx) = EventRouter::channel();
        tokio::spawn(EventRouter::new(registry.clone(), pool, rx).run());

        let session = registry.get_or_create(GuildId(1), session_options());
        session.enqueue(track("A"), None).await.unwrap();
        session.enqueue(track("B"), None).await.unwrap();

        tx.send(BackendEvent {
            guild: GuildId(1),
            kind: BackendEventKind::TrackEnded {
                reason: EndReason::Finished,
            },
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(session.current().await.unwrap().title(), "B");
        assert_eq!(session.history_len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_guild_and_node_stats_are_harmless() {
        let settings = std::sync::Arc::new(Settings::default());
        let registry = SessionRegistry::new(
            std::sync::Arc::new(permissive_backend()),
            RecordingRenderer::new(),
            settings.clone(),
        );
        let pool = NodePool::new(settings);
        let (tx, rx) = EventRouter::channel();
        tokio::spawn(EventRouter::new(registry, pool, rx).run());

        tx.send(BackendEvent {
            guild: GuildId(404),
            kind: BackendEventKind::TrackStarted,
        })
        .unwrap();
        tx.send(BackendEvent {
            guild: GuildId(404),
            kind: BackendEventKind::NodeStats {
                identifier: "fantasma".to_string(),
                stats: NodeStats::default(),
            },
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
