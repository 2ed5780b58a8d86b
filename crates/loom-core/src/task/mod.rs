//! Generation task domain module.
//!
//! A [`GenerationTask`] is the user's configuration for one generation:
//! what to write, the constraints, and the desired output format. It has no
//! lifecycle beyond being read when the prompt is assembled.
//!
//! # Module Structure
//!
//! - `model`: `GenerationTask` and `OutputFormat`

mod model;

// Re-export public API
pub use model::{GenerationTask, OutputFormat};
