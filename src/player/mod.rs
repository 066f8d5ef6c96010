//! # Player Module
//!
//! Core playback engine: one [`PlayerSession`] per guild, owning the
//! track queue, the now-playing pointer and the serialized transition
//! region shared between user commands and backend callbacks.
//!
//! ## Architecture
//!
//! ### [`session`] - Player state machine
//! - Serializes transitions (play, skip, seek, loop, shuffle, reorder)
//! - Reacts to asynchronous backend events with the same locking
//!   discipline as user commands
//! - Owns the idle timer and the display refresh lifecycle
//!
//! ### [`queue`] - Queue management
//! - Double-ended pending queue plus a bounded recently-played history
//! - Cyclic rotation, uniform shuffle, title matching
//!
//! ### [`registry`] - Tenant registry
//! - Explicit guild-to-session mapping with first-class creation and
//!   destruction (no implicit sessions)
//!
//! ### [`events`] - Event routing
//! - Dispatches backend events (track start/end/error, socket close,
//!   node stats) to the owning session
//!
//! ## Concurrency model
//!
//! All operations for a guild run as cooperative tokio tasks. The
//! transition region is guarded by an advisory lock with strict
//! no-op-on-contention semantics: whoever holds it will call `advance`
//! on release, so latecomers never block and never double-play. The
//! fixed end-of-track and error-cooldown windows hold that lock on
//! purpose to absorb backend event storms.

pub mod events;
pub mod queue;
pub mod registry;
pub mod session;
pub mod track;

pub use events::EventRouter;
pub use queue::{LoopMode, TrackQueue};
pub use registry::SessionRegistry;
pub use session::{BackOutcome, PlayerSession, SeekDirection, SessionOptions};
pub use track::{Track, TrackInfo};
