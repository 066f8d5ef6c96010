//! # UI Module
//!
//! Display synchronization for the live status view.
//!
//! The core never builds platform UI: it produces view models
//! ([`SessionView`], [`Notice`]) and hands them to an external
//! [`DisplayRenderer`]. [`DisplaySync`] keeps that view in step with
//! playback state - coalescing refresh requests, debouncing
//! non-interactive ones and swallowing render failures.

pub mod display;
pub mod view;

pub use display::{DisplayRenderer, DisplaySync, ViewHandle};
pub use view::{parse_position, time_format, Notice, NowPlaying, SessionView, UpcomingEntry};
