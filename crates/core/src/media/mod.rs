//! Source media description and requested effects.

mod effects;
mod types;

pub use effects::{EffectsError, MediaEffects, MAX_PITCH_SEMITONES};
pub use types::{MediaAsset, MediaKind};
