use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{close_code, AudioBackend, EndReason, FilterSpec, TrackError};
use crate::config::Settings;
use crate::error::PlayerError;
use crate::model::{ChannelId, GuildId, UserId};
use crate::player::queue::{LoopMode, TrackQueue};
use crate::player::registry::SessionRegistry;
use crate::player::track::Track;
use crate::ui::display::{DisplayRenderer, DisplaySync};
use crate::ui::view::{Notice, NowPlaying, SessionView, UpcomingEntry};
use crate::ui::view::time_format;

/// Exclusión mutua de la región de transición (decidir qué suena
/// después). Quien no consigue el lock NO espera: la transición en curso
/// va a llamar a `advance` al soltar, así que el camino correcto es
/// no hacer nada.
#[derive(Debug, Default)]
pub(crate) struct TransitionLock {
    engaged: AtomicBool,
}

impl TransitionLock {
    pub(crate) fn try_acquire(&self) -> Option<TransitionGuard<'_>> {
        if self.engaged.swap(true, Ordering::Acquire) {
            None
        } else {
            Some(TransitionGuard { lock: self })
        }
    }

    pub(crate) fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }
}

pub(crate) struct TransitionGuard<'a> {
    lock: &'a TransitionLock,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.lock.engaged.store(false, Ordering::Release);
    }
}

/// Resultado de `go_back`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    /// No había historial ni cola: la canción actual vuelve al inicio.
    RestartedCurrent,
    /// Se volvió a la canción anterior.
    SteppedBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// Datos de creación de una sesión.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Canal de texto donde vive la vista de estado.
    pub text_channel: ChannelId,
    /// Quien pidió la primera canción.
    pub requester: UserId,
    /// Si ya tiene permisos de staff no hace falta sumarlo a los DJ.
    pub requester_is_staff: bool,
}

#[derive(Debug)]
struct SessionState {
    current: Option<Track>,
    last_track: Option<Track>,
    queue: TrackQueue,
    loop_mode: LoopMode,
    /// Marcador de "volver atrás" en curso; lo consume exactamente una
    /// vez el próximo evento de fin de canción.
    rewinding: bool,
    nightcore: bool,
    restrict_mode: bool,
    paused: bool,
    volume: u16,
    position_ms: u64,
    dj: HashSet<UserId>,
    votes: HashSet<UserId>,
    bound_channel: Option<ChannelId>,
    in_voice: bool,
    command_log: Option<(UserId, String)>,
}

/// Sesión de reproducción de un servidor: la máquina de estados que
/// posee la cola, el puntero de reproducción y la disciplina de
/// transiciones compartida entre comandos de usuario y eventos del
/// backend.
pub struct PlayerSession {
    guild: GuildId,
    backend: Arc<dyn AudioBackend>,
    settings: Arc<Settings>,
    state: AsyncMutex<SessionState>,
    transition: TransitionLock,
    destroyed: AtomicBool,
    idle: Mutex<Option<CancellationToken>>,
    display: DisplaySync,
    weak: Weak<PlayerSession>,
    registry: Weak<SessionRegistry>,
}

impl PlayerSession {
    pub(crate) fn new(
        guild: GuildId,
        options: SessionOptions,
        backend: Arc<dyn AudioBackend>,
        renderer: Arc<dyn DisplayRenderer>,
        settings: Arc<Settings>,
        registry: Weak<SessionRegistry>,
    ) -> Arc<Self> {
        let mut dj = HashSet::new();
        if !options.requester_is_staff {
            dj.insert(options.requester);
        }

        Arc::new_cyclic(|weak| Self {
            guild,
            backend,
            display: DisplaySync::new(
                guild,
                options.text_channel,
                renderer,
                settings.refresh_debounce,
            ),
            state: AsyncMutex::new(SessionState {
                current: None,
                last_track: None,
                queue: TrackQueue::new(settings.history_limit),
                loop_mode: LoopMode::Off,
                rewinding: false,
                nightcore: false,
                restrict_mode: false,
                paused: false,
                volume: settings.default_volume,
                position_ms: 0,
                dj,
                votes: HashSet::new(),
                bound_channel: None,
                in_voice: false,
                command_log: None,
            }),
            settings,
            transition: TransitionLock::default(),
            destroyed: AtomicBool::new(false),
            idle: Mutex::new(None),
            weak: weak.clone(),
            registry,
        })
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Cola
    // ------------------------------------------------------------------

    /// Agrega una canción a la cola (al final, o en la posición interna
    /// indicada) y arranca la reproducción si no hay nada sonando.
    pub async fn enqueue(&self, track: Track, position: Option<usize>) -> Result<(), PlayerError> {
        if self.is_destroyed() {
            return Err(PlayerError::NoActiveSession);
        }

        self.cancel_idle();
        info!("➕ Agregado a la cola: {}", track.title());

        let start_playback = {
            let mut st = self.state.lock().await;
            match position {
                Some(index) => st.queue.insert(index, track),
                None => st.queue.push_back(track),
            }
            st.current.is_none()
        };

        if start_playback {
            self.advance().await
        } else {
            self.request_refresh(false);
            Ok(())
        }
    }

    /// Agrega una playlist completa. Con posición y al menos dos
    /// canciones se insertan en bloque conservando el orden.
    pub async fn enqueue_list(
        &self,
        tracks: Vec<Track>,
        position: Option<usize>,
    ) -> Result<usize, PlayerError> {
        if self.is_destroyed() {
            return Err(PlayerError::NoActiveSession);
        }

        self.cancel_idle();
        let added = tracks.len();
        info!("➕ Agregadas {} canciones a la cola", added);

        let start_playback = {
            let mut st = self.state.lock().await;
            match position {
                Some(index) if added >= 2 => {
                    for track in tracks.into_iter().rev() {
                        st.queue.insert(index, track);
                    }
                }
                _ => {
                    for track in tracks {
                        st.queue.push_back(track);
                    }
                }
            }
            st.current.is_none()
        };

        if start_playback {
            self.advance().await?;
        } else {
            self.request_refresh(false);
        }
        Ok(added)
    }

    /// Elimina la canción en la posición interna (base 0).
    pub async fn remove_track(&self, index: usize) -> Result<Track, PlayerError> {
        let removed = {
            let mut st = self.state.lock().await;
            st.queue.remove_at(index)?
        };
        self.request_refresh(false);
        Ok(removed)
    }

    /// Mezcla la cola (requiere un mínimo de canciones).
    pub async fn shuffle_queue(&self) -> Result<(), PlayerError> {
        {
            let mut st = self.state.lock().await;
            st.queue.shuffle()?;
        }
        info!("🔀 Cola mezclada en guild {}", self.guild);
        self.request_refresh(false);
        Ok(())
    }

    /// Vacía la cola pendiente.
    pub async fn clear_queue(&self) -> Result<usize, PlayerError> {
        let cleared = {
            let mut st = self.state.lock().await;
            if st.queue.is_empty() {
                return Err(PlayerError::QueueEmpty);
            }
            st.queue.clear()
        };
        self.request_refresh(false);
        Ok(cleared)
    }

    /// Readiciona el historial de canciones tocadas a la cola.
    pub async fn readd_played(&self) -> Result<usize, PlayerError> {
        let (moved, start_playback) = {
            let mut st = self.state.lock().await;
            if st.queue.history_is_empty() {
                return Err(PlayerError::HistoryEmpty);
            }
            (st.queue.readd_history(), st.current.is_none())
        };

        if start_playback {
            self.advance().await?;
        } else {
            self.request_refresh(false);
        }
        Ok(moved)
    }

    /// Mueve la canción que matchea la consulta a la posición pedida
    /// (base 1; lo negativo o cero se rechaza).
    pub async fn move_track(&self, query: &str, position: i64) -> Result<Track, PlayerError> {
        if position < 1 {
            return Err(PlayerError::InvalidPosition);
        }

        let track = {
            let mut st = self.state.lock().await;
            let index = st.queue.find(query).ok_or_else(|| PlayerError::TrackNotFound {
                query: query.to_string(),
            })?;
            let track = st.queue.remove_at(index)?;
            st.queue.insert((position - 1) as usize, track.clone());
            track
        };
        self.request_refresh(false);
        Ok(track)
    }

    /// Rota la cola para que la canción que matchea quede primera, sin
    /// interrumpir lo que está sonando.
    pub async fn rotate_to_track(&self, query: &str) -> Result<Track, PlayerError> {
        let track = {
            let mut st = self.state.lock().await;
            let index = st.queue.find(query).ok_or_else(|| PlayerError::TrackNotFound {
                query: query.to_string(),
            })?;
            let track = st.queue.get(index).cloned().ok_or(PlayerError::TrackNotFound {
                query: query.to_string(),
            })?;
            if index > 0 {
                st.queue.rotate(index as isize);
            }
            track
        };
        self.request_refresh(false);
        Ok(track)
    }

    /// Salta directo a la canción que matchea: la actual interrumpida
    /// vuelve al final de la cola y el backend detiene la reproducción
    /// (el evento de fin con motivo `Stopped` dispara `advance`).
    pub async fn skip_to_track(&self, query: &str) -> Result<Track, PlayerError> {
        let track = {
            let mut st = self.state.lock().await;
            if st.current.is_none() {
                return Err(PlayerError::NoCurrentTrack);
            }
            let index = st.queue.find(query).ok_or_else(|| PlayerError::TrackNotFound {
                query: query.to_string(),
            })?;
            let track = st.queue.get(index).cloned().ok_or(PlayerError::TrackNotFound {
                query: query.to_string(),
            })?;

            if let Some(last) = st.last_track.take() {
                st.queue.push_back(last);
            }
            if st.loop_mode == LoopMode::Current {
                st.loop_mode = LoopMode::Off;
            }
            if index > 0 {
                st.queue.rotate(index as isize);
            }
            track
        };

        self.backend
            .stop(self.guild)
            .await
            .map_err(|_| PlayerError::BackendUnavailable)?;
        Ok(track)
    }

    // ------------------------------------------------------------------
    // Transiciones
    // ------------------------------------------------------------------

    /// Único punto de entrada que le pide al backend la próxima canción.
    ///
    /// Con la transición tomada por otro es un no-op puro: el dueño
    /// actual va a llamar a `advance` cuando termine. Con la cola vacía
    /// entra en modo inactivo y arma el temporizador de apagado.
    pub async fn advance(&self) -> Result<(), PlayerError> {
        if self.is_destroyed() {
            return Ok(());
        }

        let Some(_guard) = self.transition.try_acquire() else {
            debug!("🔒 Transición en curso en guild {}, advance ignorado", self.guild);
            return Ok(());
        };

        let popped = {
            let mut st = self.state.lock().await;
            let popped = st.queue.pop_front();
            if popped.is_none() {
                st.current = None;
            }
            popped
        };

        let Some(track) = popped else {
            self.enter_idle().await;
            return Ok(());
        };

        self.cancel_idle();

        {
            let mut st = self.state.lock().await;
            st.last_track = Some(track.clone());
            st.current = Some(track.clone());
            st.position_ms = 0;
            st.paused = false;
        }

        info!("🎵 Reproduciendo: {} en guild {}", track.title(), self.guild);
        self.backend.play(self.guild, &track).await.map_err(|e| {
            warn!("⚠️ Falla al pedir reproducción al backend: {:?}", e);
            PlayerError::BackendUnavailable
        })?;

        Ok(())
    }

    async fn enter_idle(&self) {
        info!("📭 Cola vacía en guild {}, modo inactivo", self.guild);

        self.display.dismiss_view().await;
        self.display
            .announce(Notice::IdleCountdown {
                timeout_label: time_format(self.settings.idle_timeout.as_millis() as u64),
            })
            .await;

        let token = CancellationToken::new();
        if let Some(old) = self.idle.lock().replace(token.clone()) {
            old.cancel();
        }

        let weak = self.weak.clone();
        let timeout = self.settings.idle_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let Some(session) = weak.upgrade() else { return };
                    info!("💤 Apagando el reproductor de guild {} por inactividad", session.guild);
                    session.display.announce(Notice::IdleShutdown).await;
                    session.destroy().await;
                }
            }
        });
    }

    fn cancel_idle(&self) {
        if let Some(token) = self.idle.lock().take() {
            token.cancel();
        }
    }

    // ------------------------------------------------------------------
    // Eventos del backend
    // ------------------------------------------------------------------

    /// El backend confirmó que la canción empezó a sonar.
    pub async fn on_track_started(&self) {
        if self.is_destroyed() {
            return;
        }

        // Si la vista quedó enterrada en el canal, se reenvía
        if !self.display.is_view_current().await {
            self.display.mark_force_resend();
        }
        self.render_display().await;

        let mut st = self.state.lock().await;
        st.command_log = None;
        st.position_ms = 0;
        st.paused = false;
    }

    /// El backend reportó el fin de la canción. Acá se decide la
    /// recolocación (loop, rewind, historial) y se avanza.
    pub async fn on_track_ended(&self, reason: EndReason) {
        if self.is_destroyed() {
            return;
        }

        if self.transition.is_engaged() {
            // la transición superpuesta ya es dueña de la decisión
            debug!("🔒 Fin de canción ignorado en guild {} (transición en curso)", self.guild);
            return;
        }

        match reason {
            EndReason::Finished => {
                self.state.lock().await.command_log = None;
            }
            EndReason::Stopped => self.display.mark_force_resend(),
            _ => return,
        }

        let Some(_guard) = self.transition.try_acquire() else {
            return;
        };

        {
            let mut st = self.state.lock().await;
            st.current = None;
            st.votes.clear();
        }

        // ventana corta para absorber ráfagas de eventos del backend
        tokio::time::sleep(self.settings.track_end_grace).await;

        {
            let mut st = self.state.lock().await;
            if let Some(last) = st.last_track.clone() {
                match st.loop_mode {
                    LoopMode::Queue => {
                        if st.rewinding {
                            st.queue.insert(1, last);
                            st.rewinding = false;
                        } else {
                            st.queue.push_back(last);
                        }
                    }
                    LoopMode::Current => st.queue.push_front(last),
                    LoopMode::Off => {
                        if st.rewinding {
                            st.queue.insert(1, last);
                            st.rewinding = false;
                        } else {
                            st.queue.record_played(last);
                        }
                    }
                }
            } else if st.rewinding {
                st.rewinding = false;
            }
        }

        drop(_guard);

        if let Err(e) = self.advance().await {
            error!("❌ Falla al avanzar tras el fin de canción: {e}");
        }
    }

    /// El backend reportó una falla de reproducción.
    pub async fn on_track_exception(&self, error: &TrackError) {
        if self.is_destroyed() {
            return;
        }

        let failed = { self.state.lock().await.last_track.clone() };
        if let Some(track) = &failed {
            error!(
                "❌ Falla al reproducir {} en guild {}: {}",
                track.title(),
                self.guild,
                error.message
            );
            self.display
                .announce(Notice::PlaybackFailed {
                    title: track.title().to_string(),
                    uri: track.uri().to_string(),
                    error: error.message.clone(),
                })
                .await;
        }

        let Some(_guard) = self.transition.try_acquire() else {
            return;
        };

        {
            let mut st = self.state.lock().await;
            st.current = None;
            if let Some(last) = st.last_track.clone() {
                if error.is_rate_limited() {
                    // rate limit: reintentar la misma más tarde
                    st.queue.push_front(last);
                } else {
                    st.queue.record_played(last);
                }
            }
        }

        // cooldown para no ciclar errores contra el backend
        tokio::time::sleep(self.settings.exception_cooldown).await;
        drop(_guard);

        if let Err(e) = self.advance().await {
            error!("❌ Falla al avanzar tras el error de canción: {e}");
        }
    }

    /// El socket de voz del backend se cerró.
    pub async fn on_socket_closed(&self, code: u16) {
        if self.is_destroyed() {
            return;
        }

        match code {
            close_code::NORMAL => {}
            close_code::DISCONNECTED => {
                let (in_voice, channel) = {
                    let st = self.state.lock().await;
                    (st.in_voice, st.bound_channel)
                };
                if in_voice {
                    return;
                }
                warn!("🔌 Conexión de voz perdida en guild {}", self.guild);
                self.display
                    .announce(Notice::ConnectionLost { channel })
                    .await;
                self.destroy().await;
            }
            close_code::SESSION_INVALID => {
                let channel = { self.state.lock().await.bound_channel };
                if let Some(channel) = channel {
                    info!("🔄 Renegociando la conexión de voz en guild {}", self.guild);
                    if let Err(e) = self.backend.connect(self.guild, channel).await {
                        warn!("⚠️ Falla al reconectar el canal de voz: {:?}", e);
                    }
                }
            }
            other => warn!(
                "⚠️ Socket de voz cerrado en guild {} con código {}",
                self.guild, other
            ),
        }
    }

    // ------------------------------------------------------------------
    // Controles
    // ------------------------------------------------------------------

    /// Salta la canción actual. El backend emitirá el fin con motivo
    /// `Stopped`, que es lo que dispara la próxima canción.
    pub async fn skip(&self) -> Result<(), PlayerError> {
        {
            let mut st = self.state.lock().await;
            if st.queue.is_empty() {
                return Err(PlayerError::QueueEmpty);
            }
            if st.current.is_none() {
                return Err(PlayerError::NoCurrentTrack);
            }
            if st.loop_mode == LoopMode::Current {
                st.loop_mode = LoopMode::Off;
            }
        }

        self.backend
            .stop(self.guild)
            .await
            .map_err(|_| PlayerError::BackendUnavailable)
    }

    /// Vuelve a la canción anterior; sin historial ni cola, reinicia la
    /// actual desde cero.
    pub async fn go_back(&self) -> Result<BackOutcome, PlayerError> {
        enum Followup {
            RestartCurrent,
            StopCurrent,
            Advance,
        }

        let followup = {
            let mut st = self.state.lock().await;

            if st.queue.is_empty() && st.queue.history_is_empty() {
                if st.current.is_none() {
                    return Err(PlayerError::NoCurrentTrack);
                }
                Followup::RestartCurrent
            } else {
                let track = match st.queue.pop_last_played() {
                    Some(track) => track,
                    None => {
                        // sin historial: el fondo de la cola es el destino y
                        // la actual queda como próxima
                        let Some(track) = st.queue.pop_back() else {
                            return Err(PlayerError::QueueEmpty);
                        };
                        st.last_track = None;
                        if let Some(current) = st.current.clone() {
                            st.queue.push_front(current);
                        }
                        track
                    }
                };
                st.queue.push_front(track);

                if st.loop_mode == LoopMode::Current {
                    st.loop_mode = LoopMode::Off;
                }
                st.rewinding = true;

                if st.current.is_some() {
                    Followup::StopCurrent
                } else {
                    Followup::Advance
                }
            }
        };

        match followup {
            Followup::RestartCurrent => {
                self.backend
                    .seek(self.guild, 0)
                    .await
                    .map_err(|_| PlayerError::BackendUnavailable)?;
                self.state.lock().await.position_ms = 0;
                Ok(BackOutcome::RestartedCurrent)
            }
            Followup::StopCurrent => {
                self.backend
                    .stop(self.guild)
                    .await
                    .map_err(|_| PlayerError::BackendUnavailable)?;
                Ok(BackOutcome::SteppedBack)
            }
            Followup::Advance => {
                self.advance().await?;
                Ok(BackOutcome::SteppedBack)
            }
        }
    }

    /// Lleva la reproducción a la posición pedida (en milisegundos).
    pub async fn seek(&self, position_ms: u64) -> Result<SeekDirection, PlayerError> {
        let direction = {
            let st = self.state.lock().await;
            let Some(current) = st.current.as_ref() else {
                return Err(PlayerError::NoCurrentTrack);
            };
            if current.is_stream() {
                return Err(PlayerError::InvalidPosition);
            }
            if position_ms > st.position_ms {
                SeekDirection::Forward
            } else {
                SeekDirection::Backward
            }
        };

        self.backend
            .seek(self.guild, position_ms)
            .await
            .map_err(|_| PlayerError::BackendUnavailable)?;

        self.state.lock().await.position_ms = position_ms;
        self.request_refresh(false);
        Ok(direction)
    }

    /// Pausa o reanuda. Pedir el estado en el que ya está es un no-op
    /// blando: devuelve `false` sin tocar el backend.
    pub async fn set_pause(&self, paused: bool) -> Result<bool, PlayerError> {
        {
            let st = self.state.lock().await;
            if st.current.is_none() {
                return Err(PlayerError::NoCurrentTrack);
            }
            if st.paused == paused {
                return Ok(false);
            }
        }

        self.backend
            .pause(self.guild, paused)
            .await
            .map_err(|_| PlayerError::BackendUnavailable)?;

        self.state.lock().await.paused = paused;
        self.request_refresh(false);
        Ok(true)
    }

    /// Ajusta el volumen. El rango ya viene acotado por la capa de
    /// comandos ([`Settings::parse_volume`]).
    pub async fn set_volume(&self, volume: u16) -> Result<(), PlayerError> {
        self.backend
            .set_volume(self.guild, volume)
            .await
            .map_err(|_| PlayerError::BackendUnavailable)?;

        self.state.lock().await.volume = volume;
        info!("🔊 Volumen ajustado a {}% en guild {}", volume, self.guild);
        self.request_refresh(false);
        Ok(())
    }

    /// Alterna la repetición de la canción actual. El modo de cola solo
    /// se activa con [`loop_queue`](Self::loop_queue) y alternar lo
    /// desactiva por completo.
    pub async fn toggle_loop(&self) -> LoopMode {
        let mode = {
            let mut st = self.state.lock().await;
            st.loop_mode = match st.loop_mode {
                LoopMode::Off => LoopMode::Current,
                LoopMode::Current | LoopMode::Queue => LoopMode::Off,
            };
            st.loop_mode
        };
        self.request_refresh(false);
        mode
    }

    /// Activa la repetición de la cola. Devuelve `false` si ya estaba
    /// activada (no-op blando).
    pub async fn loop_queue(&self) -> bool {
        let changed = {
            let mut st = self.state.lock().await;
            if st.loop_mode == LoopMode::Queue {
                false
            } else {
                st.loop_mode = LoopMode::Queue;
                true
            }
        };
        if changed {
            self.request_refresh(false);
        }
        changed
    }

    /// Alterna el efecto nightcore aplicando el filtro en el backend.
    pub async fn toggle_nightcore(&self) -> Result<bool, PlayerError> {
        let enabled = {
            let mut st = self.state.lock().await;
            st.nightcore = !st.nightcore;
            st.nightcore
        };

        let filter = if enabled {
            FilterSpec::nightcore()
        } else {
            FilterSpec::reset()
        };

        self.backend
            .apply_filter(self.guild, &filter)
            .await
            .map_err(|_| PlayerError::BackendUnavailable)?;

        self.request_refresh(false);
        Ok(enabled)
    }

    /// Alterna el modo restringido (solo DJ/staff).
    pub async fn toggle_restrict(&self) -> bool {
        let enabled = {
            let mut st = self.state.lock().await;
            st.restrict_mode = !st.restrict_mode;
            st.restrict_mode
        };
        self.request_refresh(false);
        enabled
    }

    // ------------------------------------------------------------------
    // DJ / votos / voz
    // ------------------------------------------------------------------

    /// Suma un usuario a la lista de DJ. Devuelve `false` si ya estaba.
    pub async fn add_dj(&self, user: UserId) -> bool {
        self.state.lock().await.dj.insert(user)
    }

    pub async fn is_dj(&self, user: UserId) -> bool {
        self.state.lock().await.dj.contains(&user)
    }

    pub async fn restrict_mode(&self) -> bool {
        self.state.lock().await.restrict_mode
    }

    /// Registra un voto (para acciones por votación). Devuelve `false`
    /// si el usuario ya había votado. Los votos se limpian en cada fin
    /// de canción.
    pub async fn cast_vote(&self, user: UserId) -> bool {
        self.state.lock().await.votes.insert(user)
    }

    pub async fn vote_count(&self) -> usize {
        self.state.lock().await.votes.len()
    }

    /// Vincula la sesión a un canal de voz.
    pub async fn connect(&self, channel: ChannelId) -> Result<(), PlayerError> {
        self.backend
            .connect(self.guild, channel)
            .await
            .map_err(|_| PlayerError::BackendUnavailable)?;

        let mut st = self.state.lock().await;
        st.bound_channel = Some(channel);
        st.in_voice = true;
        Ok(())
    }

    /// El gateway reporta el estado de voz real del bot en el servidor.
    pub async fn notify_voice_state(&self, channel: Option<ChannelId>) {
        let mut st = self.state.lock().await;
        match channel {
            Some(channel) => {
                st.bound_channel = Some(channel);
                st.in_voice = true;
            }
            None => st.in_voice = false,
        }
    }

    // ------------------------------------------------------------------
    // Vista
    // ------------------------------------------------------------------

    /// Registra la última interacción para mostrarla en la vista.
    pub async fn log_action(&self, user: UserId, text: impl Into<String>, interactive: bool) {
        self.state.lock().await.command_log = Some((user, text.into()));
        self.request_refresh(interactive);
    }

    /// Agenda un refresco de la vista de estado.
    pub fn request_refresh(&self, interactive: bool) {
        if self.is_destroyed() {
            return;
        }
        self.display.request_refresh(self.weak.clone(), interactive);
    }

    /// Reenvía la vista de estado desde cero.
    pub async fn resend_display(&self) {
        self.display.dismiss_view().await;
        self.render_display().await;
    }

    pub(crate) async fn render_display(&self) {
        let view = self.view().await;
        self.display.present(view).await;
    }

    pub(crate) fn display(&self) -> &DisplaySync {
        &self.display
    }

    /// Modelo de vista del estado actual de la sesión.
    pub async fn view(&self) -> SessionView {
        let st = self.state.lock().await;
        let preview = self.settings.queue_preview;

        SessionView {
            now_playing: st.current.as_ref().map(NowPlaying::from_track),
            paused: st.paused,
            volume: st.volume,
            loop_mode: st.loop_mode,
            nightcore: st.nightcore,
            restrict_mode: st.restrict_mode,
            queue_len: st.queue.len(),
            upcoming: st
                .queue
                .iter()
                .take(preview)
                .map(UpcomingEntry::from_track)
                .collect(),
            overflow: st.queue.len().saturating_sub(preview),
            command_log: st.command_log.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Accesores de estado
    // ------------------------------------------------------------------

    pub async fn current(&self) -> Option<Track> {
        self.state.lock().await.current.clone()
    }

    pub async fn last_track(&self) -> Option<Track> {
        self.state.lock().await.last_track.clone()
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.queue.history_len()
    }

    pub async fn loop_mode(&self) -> LoopMode {
        self.state.lock().await.loop_mode
    }

    pub async fn is_paused(&self) -> bool {
        self.state.lock().await.paused
    }

    pub async fn volume(&self) -> u16 {
        self.state.lock().await.volume
    }

    // ------------------------------------------------------------------
    // Ciclo de vida
    // ------------------------------------------------------------------

    /// Apaga la sesión: cancela los temporizadores, desarma la vista,
    /// libera la conexión del backend y se quita del registro.
    /// Idempotente.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("⏹️ Destruyendo la sesión de guild {}", self.guild);
        self.cancel_idle();
        self.display.teardown().await;

        if let Err(e) = self.backend.disconnect(self.guild).await {
            warn!("⚠️ Falla al liberar la conexión del backend: {:?}", e);
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.guild);
        }
    }
}
