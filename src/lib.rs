//! # playhead
//!
//! Per-guild music playback controller for chat platforms.
//!
//! Manages a queue of tracks per guild, drives a remote audio-playback
//! backend through an abstract RPC interface and keeps a live status
//! display synchronized with true playback state - despite concurrent
//! user commands and out-of-order backend events.
//!
//! ## Components
//!
//! - [`player`]: the core engine - [`PlayerSession`](player::PlayerSession)
//!   state machine, [`TrackQueue`](player::TrackQueue), the tenant
//!   [`SessionRegistry`](player::SessionRegistry) and the
//!   [`EventRouter`](player::EventRouter)
//! - [`backend`]: the [`AudioBackend`](backend::AudioBackend) trait the
//!   controller calls, the [`BackendEvent`](backend::BackendEvent)s it
//!   receives, and the [`NodePool`](backend::node::NodePool) of remote
//!   audio nodes
//! - [`ui`]: view models plus the debounced
//!   [`DisplaySync`](ui::DisplaySync) that feeds an external renderer
//! - [`config`]: env-driven [`Settings`](config::Settings) with the
//!   timing windows (idle timeout, end-of-track grace, error cooldown,
//!   refresh debounce) and node descriptors
//!
//! The chat-platform command framework, permission checks and the
//! message transport are external collaborators: they resolve a command
//! to a guild session, enforce policy, and then call plain operations
//! on [`PlayerSession`](player::PlayerSession). The core raises only
//! the domain errors it alone can detect ([`PlayerError`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use playhead::config::Settings;
//! use playhead::player::{EventRouter, SessionRegistry, SessionOptions};
//! use playhead::backend::node::NodePool;
//! # use playhead::backend::AudioBackend;
//! # use playhead::ui::DisplayRenderer;
//!
//! # async fn example(
//! #     backend: Arc<dyn AudioBackend>,
//! #     renderer: Arc<dyn DisplayRenderer>,
//! # ) -> anyhow::Result<()> {
//! let settings = Arc::new(Settings::load()?);
//!
//! let pool = NodePool::new(settings.clone());
//! pool.spawn_connect_all();
//!
//! let registry = SessionRegistry::new(backend, renderer, settings);
//! let (events_tx, events_rx) = EventRouter::channel();
//! tokio::spawn(EventRouter::new(registry.clone(), pool, events_rx).run());
//!
//! let session = registry.get_or_create(
//!     playhead::model::GuildId(1),
//!     SessionOptions {
//!         text_channel: playhead::model::ChannelId(2),
//!         requester: playhead::model::UserId(3),
//!         requester_is_staff: false,
//!     },
//! );
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod player;
pub mod ui;

#[cfg(test)]
pub(crate) mod testkit;

pub use error::{CommandRejection, PlayerError};
pub use model::{ChannelId, GuildId, UserId};
