//! Structured progress events for a normalization run.

mod types;
mod handle;

pub use types::*;
pub use handle::*;
