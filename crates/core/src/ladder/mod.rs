//! The quality ladder: rungs, budgets, encode attempts and the controller
//! that walks them.
//!
//! A run moves through [`LadderState`]s: `Idle` → `Analyzing` →
//! `Normalizing` → `Attempting(0..n)` → `Accepted` or `Failed`. Rungs are
//! tried best quality first, and the first output at or under the size
//! ceiling wins. When none fits, the last successful encode is delivered as
//! [`Delivery::Oversized`].

mod budget;
mod controller;
mod executor;
mod rung;
mod scratch;
mod trim;
mod types;
mod validator;

pub use budget::{budget, plan, total_kbps, BitrateBudget};
pub use controller::LadderController;
pub use executor::execute;
pub use rung::{reference_specs, validate_specs, EncoderPreset, EncodingRung, Ladder, RungSpec};
pub use scratch::ScratchDir;
pub use trim::{output_duration, trim_limit, DEFAULT_DURATION_CEILING_SECS};
pub use types::{
    Delivery, EncodeAttemptResult, EncodeErrorKind, LadderState, NormalizeError,
    NormalizeRequest, NormalizedArtifact,
};
pub use validator::{discard, validate, Verdict};
