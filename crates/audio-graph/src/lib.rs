//! vidfx Audio Graph
//!
//! Routes a source's audio through a gain stage into a track the encoder
//! consumes:
//!
//! ```text
//! MediaSource ─► ElementSourceNode ─► GainNode ─► AudioTrack ─► encoder
//!                (rate + channel       (volume/100)
//!                 conversion)
//! ```
//!
//! Route construction never aborts a session: [`build_route`] logs the
//! failure and returns `None`, and the session records video only.

pub mod context;
pub mod route;

pub use context::{AudioContext, ContextState};
pub use route::{apply_playback, build_route, AudioRoute, AudioTrack, ElementSourceNode, GainNode};
