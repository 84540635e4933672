//! vidfx Media Core
//!
//! Contracts shared by the render loop, the audio graph and the capture
//! engine:
//! - **MediaSource:** the playback element a session decodes from
//! - **VideoFrame / AudioChunk:** decoded buffers exchanged between stages
//! - **RateResampler:** streaming linear resampler (speed change with pitch
//!   shift, sample-rate conversion)
//! - **SyntheticSource:** deterministic pattern + tone source for tests and
//!   capability checks

pub mod audio;
pub mod frame;
pub mod source;
pub mod synthetic;

pub use audio::*;
pub use frame::*;
pub use source::*;
pub use synthetic::SyntheticSource;
