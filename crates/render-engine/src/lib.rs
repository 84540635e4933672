//! vidfx Render Engine
//!
//! Re-renders each source frame onto a drawing surface with the effects
//! chain of a session:
//!
//! ```text
//! source frame ──► flip (translate · scale) ──► colour filter ──► surface
//!                                                                   │
//!                    pixel noise ◄──────────────────────────────────┘
//!                        │
//!                        ▼
//!                  rotating lines ──► progress
//! ```

pub mod filter;
pub mod overlay;
pub mod progress;
pub mod render_loop;
pub mod surface;

pub use filter::ColorFilter;
pub use overlay::{PixelNoise, RotatingLines, PHASE_INCREMENT};
pub use progress::ProgressTracker;
pub use render_loop::{FrameOutcome, LoopState, RenderLoop, StopReason};
pub use surface::{Paint, Surface};
