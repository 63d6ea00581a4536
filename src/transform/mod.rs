//! Field mapping, normalization and derived metrics applied to every raw
//! record before it reaches storage.

pub mod batch;
pub mod field_map;
pub mod metrics;
pub mod normalize;
pub mod record;

pub use batch::{BatchOptions, BatchTransformer, CancelFlag};
pub use record::{PostTransformer, RecordTransformer, TransformContext, UserTransformer};
