//! Dobles de prueba compartidos entre los módulos.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::backend::MockAudioBackend;
use crate::config::Settings;
use crate::model::{ChannelId, GuildId, UserId};
use crate::player::registry::SessionRegistry;
use crate::player::session::{PlayerSession, SessionOptions};
use crate::player::track::{Track, TrackInfo};
use crate::ui::display::{DisplayRenderer, ViewHandle};
use crate::ui::view::{Notice, SessionView};

/// Renderizador que solo cuenta lo que le piden.
#[derive(Default)]
pub struct RecordingRenderer {
    pub renders: AtomicUsize,
    pub updates: AtomicUsize,
    pub dismissals: AtomicUsize,
    pub notices: Mutex<Vec<Notice>>,
    pub last_view: Mutex<Option<SessionView>>,
    /// Respuesta de `is_current` (la vista sigue siendo el último mensaje).
    pub view_is_current: AtomicBool,
    pub fail_renders: AtomicBool,
    next_handle: AtomicU64,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        let renderer = Self::default();
        renderer.view_is_current.store(true, Ordering::Release);
        Arc::new(renderer)
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::Acquire)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::Acquire)
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl DisplayRenderer for RecordingRenderer {
    async fn render(
        &self,
        _guild: GuildId,
        _channel: ChannelId,
        view: &SessionView,
    ) -> Result<ViewHandle> {
        if self.fail_renders.load(Ordering::Acquire) {
            anyhow::bail!("render roto a propósito");
        }
        self.renders.fetch_add(1, Ordering::AcqRel);
        *self.last_view.lock() = Some(view.clone());
        Ok(ViewHandle(self.next_handle.fetch_add(1, Ordering::AcqRel)))
    }

    async fn update(
        &self,
        _guild: GuildId,
        _handle: &ViewHandle,
        view: &SessionView,
    ) -> Result<()> {
        self.updates.fetch_add(1, Ordering::AcqRel);
        *self.last_view.lock() = Some(view.clone());
        Ok(())
    }

    async fn dismiss(&self, _guild: GuildId, _handle: &ViewHandle) -> Result<()> {
        self.dismissals.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn is_current(&self, _guild: GuildId, _handle: &ViewHandle) -> bool {
        self.view_is_current.load(Ordering::Acquire)
    }

    async fn announce(&self, _guild: GuildId, _channel: ChannelId, notice: &Notice) -> Result<()> {
        self.notices.lock().push(notice.clone());
        Ok(())
    }
}

pub fn track(title: &str) -> Track {
    Track::from_info(
        TrackInfo {
            identifier: title.to_string(),
            title: title.to_string(),
            author: "autor".to_string(),
            uri: format!("https://example.com/{title}"),
            length_ms: 180_000,
            is_stream: false,
            artwork_url: None,
        },
        UserId(100),
    )
}

pub fn stream_track(title: &str) -> Track {
    Track::from_info(
        TrackInfo {
            identifier: title.to_string(),
            title: title.to_string(),
            author: "autor".to_string(),
            uri: format!("https://example.com/live/{title}"),
            length_ms: 0,
            is_stream: true,
            artwork_url: None,
        },
        UserId(100),
    )
}

/// Backend que acepta todo sin quejarse.
pub fn permissive_backend() -> MockAudioBackend {
    let mut mock = MockAudioBackend::new();
    mock.expect_connect().returning(|_, _| Ok(()));
    mock.expect_disconnect().returning(|_| Ok(()));
    mock.expect_play().returning(|_, _| Ok(()));
    mock.expect_stop().returning(|_| Ok(()));
    mock.expect_pause().returning(|_, _| Ok(()));
    mock.expect_seek().returning(|_, _| Ok(()));
    mock.expect_set_volume().returning(|_, _| Ok(()));
    mock.expect_apply_filter().returning(|_, _| Ok(()));
    mock
}

pub fn session_options() -> SessionOptions {
    SessionOptions {
        text_channel: ChannelId(10),
        requester: UserId(100),
        requester_is_staff: false,
    }
}

/// Sesión suelta (sin registro) con el backend dado.
pub fn make_session(backend: MockAudioBackend) -> (Arc<PlayerSession>, Arc<RecordingRenderer>) {
    let renderer = RecordingRenderer::new();
    let session = PlayerSession::new(
        GuildId(1),
        session_options(),
        Arc::new(backend),
        renderer.clone(),
        Arc::new(Settings::default()),
        Weak::<SessionRegistry>::new(),
    );
    (session, renderer)
}
