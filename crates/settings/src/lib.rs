//! vidfx Settings Model
//!
//! Defines the adjustable parameters of a render pass:
//! - **Settings:** colour, speed, volume, flip, overlay and pitch options
//! - **Ingestion:** per-field validation of untrusted JSON (AI suggestions,
//!   persisted values) with range clamping and default fallback
//! - **Store:** persistence of the last-used settings under a fixed key
//!
//! A `Settings` value is `Copy`; a render pass captures it once and never
//! observes later edits.

pub mod ingest;
pub mod settings;
pub mod store;

pub use ingest::*;
pub use settings::*;
pub use store::*;
