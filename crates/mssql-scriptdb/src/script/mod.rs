//! Script normalization: existence guards and the per-kind artifact builder.

pub mod headers;
mod normalize;

pub use normalize::{is_trigger_batch, normalize, NormalizeOptions, ScriptNormalizer};

/// Batch boundary marker written after every batch.
pub const BATCH_SEPARATOR: &str = "GO";
