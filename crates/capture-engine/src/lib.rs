//! vidfx Capture Engine
//!
//! Turns a source and a settings snapshot into one encoded container.
//! A render session owns every transient resource of a request and the
//! session manager keeps at most one of them alive.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    RenderSession                      │
//! │  ┌─────────────┐   ┌────────────┐   ┌──────────────┐  │
//! │  │ MediaSource │──►│ RenderLoop │──►│   Surface    │  │
//! │  └──────┬──────┘   └────────────┘   └──────┬───────┘  │
//! │         │ audio                            │ frames   │
//! │         ▼                                  ▼          │
//! │  ┌─────────────┐                    ┌──────────────┐  │
//! │  │ AudioRoute  │───────────────────►│ MediaEncoder │  │
//! │  └─────────────┘                    └──────┬───────┘  │
//! │                                            │ chunks   │
//! │                                            ▼          │
//! │                                     ChunkBuffer → Blob│
//! └──────────────────────────────────────────────────────┘
//!                                              │
//!                          SessionManager ──► ObjectUrl
//! ```

pub mod blob;
pub mod encoder;
pub mod manager;
pub mod pipeline;
pub mod scheduler;
pub mod session;

pub use blob::{Blob, ChunkBuffer, ObjectUrl, ObjectUrlRegistry};
pub use encoder::{
    ensure_supported, output_file_name, AudioFormat, EncoderConfig, EncoderEvent, EncoderFactory,
    EncoderFormat, MediaEncoder, RecorderState,
};
pub use manager::{RenderResult, SessionManager};
pub use pipeline::{GstEncoder, GstEncoderFactory, GstMediaSource};
pub use scheduler::FrameScheduler;
pub use session::{RenderOutput, RenderSession, SessionConfig};
