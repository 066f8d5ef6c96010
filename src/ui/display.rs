use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::model::{ChannelId, GuildId};
use crate::player::session::PlayerSession;
use crate::ui::view::{Notice, SessionView};

/// Referencia opaca a la vista de estado ya publicada (p. ej. el id del
/// mensaje en el canal de texto).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub u64);

/// Renderizador externo de la vista de estado.
///
/// El núcleo entrega modelos de vista ([`SessionView`], [`Notice`]) y
/// nunca arma UI de la plataforma por su cuenta.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisplayRenderer: Send + Sync {
    /// Publica una vista nueva en el canal y devuelve su referencia.
    async fn render(
        &self,
        guild: GuildId,
        channel: ChannelId,
        view: &SessionView,
    ) -> Result<ViewHandle>;

    /// Edita la vista existente en el lugar.
    async fn update(&self, guild: GuildId, handle: &ViewHandle, view: &SessionView) -> Result<()>;

    /// Elimina la vista publicada.
    async fn dismiss(&self, guild: GuildId, handle: &ViewHandle) -> Result<()>;

    /// ¿La vista sigue siendo el último mensaje del canal?
    async fn is_current(&self, guild: GuildId, handle: &ViewHandle) -> bool;

    /// Publica un aviso suelto (falla, desconexión, inactividad).
    async fn announce(&self, guild: GuildId, channel: ChannelId, notice: &Notice) -> Result<()>;
}

/// Sincroniza la vista de estado con los cambios de la sesión.
///
/// Los pedidos de refresco se fusionan: si ya hay uno pendiente, el
/// nuevo se descarta. Los refrescos no interactivos esperan la ventana
/// de debounce para absorber ráfagas de cambios; los interactivos
/// renderizan de inmediato. Las fallas del renderizador se loguean y
/// jamás se propagan al que pidió el refresco.
pub struct DisplaySync {
    guild: GuildId,
    channel: ChannelId,
    renderer: Arc<dyn DisplayRenderer>,
    debounce: Duration,
    handle: AsyncMutex<Option<ViewHandle>>,
    pending: Mutex<Option<CancellationToken>>,
    force_resend: AtomicBool,
}

impl DisplaySync {
    pub fn new(
        guild: GuildId,
        channel: ChannelId,
        renderer: Arc<dyn DisplayRenderer>,
        debounce: Duration,
    ) -> Self {
        Self {
            guild,
            channel,
            renderer,
            debounce,
            handle: AsyncMutex::new(None),
            pending: Mutex::new(None),
            force_resend: AtomicBool::new(false),
        }
    }

    /// El próximo render reenvía la vista en vez de editarla.
    pub fn mark_force_resend(&self) {
        self.force_resend.store(true, Ordering::Release);
    }

    /// Agenda un refresco de la vista. Se descarta si ya hay uno
    /// pendiente; los no interactivos esperan el debounce.
    pub fn request_refresh(&self, session: Weak<PlayerSession>, interactive: bool) {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            debug!("🔁 Refresco ya pendiente para guild {}, descartado", self.guild);
            return;
        }

        let token = CancellationToken::new();
        *pending = Some(token.clone());
        drop(pending);

        let debounce = self.debounce;
        tokio::spawn(async move {
            if !interactive {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(debounce) => {}
                }
            }

            let Some(session) = session.upgrade() else {
                return;
            };
            session.render_display().await;
            session.display().clear_pending();
        });
    }

    /// ¿El mensaje de estado sigue siendo el último del canal?
    pub async fn is_view_current(&self) -> bool {
        let handle = self.handle.lock().await;
        match handle.as_ref() {
            Some(h) => self.renderer.is_current(self.guild, h).await,
            None => false,
        }
    }

    /// Publica la vista: edita en el lugar cuando sigue siendo el último
    /// mensaje y no hay reenvío forzado; si no, la reemplaza.
    pub(crate) async fn present(&self, view: SessionView) {
        let force = self.force_resend.swap(false, Ordering::AcqRel);
        let mut handle = self.handle.lock().await;

        if !force {
            if let Some(h) = handle.as_ref() {
                if self.renderer.is_current(self.guild, h).await {
                    match self.renderer.update(self.guild, h, &view).await {
                        Ok(()) => return,
                        Err(e) => debug!("✏️ Falla al editar la vista, se reenvía: {:?}", e),
                    }
                }
            }
        }

        if let Some(old) = handle.take() {
            if let Err(e) = self.renderer.dismiss(self.guild, &old).await {
                debug!("🗑️ No se pudo eliminar la vista anterior: {:?}", e);
            }
        }

        match self.renderer.render(self.guild, self.channel, &view).await {
            Ok(h) => *handle = Some(h),
            Err(e) => error!("❌ Falla al renderizar la vista: {:?}", e),
        }
    }

    /// Elimina la vista publicada (modo inactivo, apagado).
    pub async fn dismiss_view(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(old) = handle.take() {
            if let Err(e) = self.renderer.dismiss(self.guild, &old).await {
                debug!("🗑️ No se pudo eliminar la vista: {:?}", e);
            }
        }
    }

    /// Publica un aviso suelto; las fallas solo se loguean.
    pub async fn announce(&self, notice: Notice) {
        if let Err(e) = self
            .renderer
            .announce(self.guild, self.channel, &notice)
            .await
        {
            error!("❌ Falla al publicar aviso: {:?}", e);
        }
    }

    /// Cancela el refresco pendiente y elimina la vista.
    pub async fn teardown(&self) {
        if let Some(token) = self.pending.lock().take() {
            token.cancel();
        }
        self.dismiss_view().await;
    }

    pub(crate) fn clear_pending(&self) {
        self.pending.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use crate::testkit::{make_session, permissive_backend, track};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_debounced_refreshes_coalesce_into_one_render() {
        let (session, renderer) = make_session(permissive_backend());
        session.enqueue(track("A"), None).await.unwrap();

        session.request_refresh(false);
        session.request_refresh(false);
        session.request_refresh(false);
        assert_eq!(renderer.render_count(), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(renderer.render_count(), 1);

        // liberado el pendiente, un pedido nuevo vuelve a renderizar
        session.request_refresh(false);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(renderer.render_count() + renderer.update_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interactive_refresh_renders_immediately() {
        let (session, renderer) = make_session(permissive_backend());
        session.enqueue(track("A"), None).await.unwrap();

        session.request_refresh(true);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(renderer.render_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_failures_are_swallowed() {
        let (session, renderer) = make_session(permissive_backend());
        session.enqueue(track("A"), None).await.unwrap();
        renderer.fail_renders.store(true, Ordering::Release);

        session.request_refresh(true);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(renderer.render_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_edits_in_place_while_still_latest() {
        let (session, renderer) = make_session(permissive_backend());
        session.enqueue(track("A"), None).await.unwrap();

        session.render_display().await;
        assert_eq!(renderer.render_count(), 1);

        // sigue siendo el último mensaje: edición en el lugar
        session.render_display().await;
        assert_eq!(renderer.render_count(), 1);
        assert_eq!(renderer.update_count(), 1);

        // quedó enterrada en el canal: se elimina y se reenvía
        renderer.view_is_current.store(false, Ordering::Release);
        session.render_display().await;
        assert_eq!(renderer.render_count(), 2);
        assert_eq!(renderer.dismissals.load(Ordering::Acquire), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_resend_skips_in_place_edit() {
        let (session, renderer) = make_session(permissive_backend());
        session.enqueue(track("A"), None).await.unwrap();

        session.render_display().await;
        session.display().mark_force_resend();
        session.render_display().await;

        assert_eq!(renderer.render_count(), 2);
        assert_eq!(renderer.update_count(), 0);
    }
}
