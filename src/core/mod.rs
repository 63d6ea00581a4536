pub mod analytics;
pub mod etl;
pub mod extract;
pub mod load;
pub mod pipeline;

pub use crate::domain::model::{
    EntityKind, ProcessedPost, ProcessedRecord, ProcessedUser, RawRecord, RunContext,
    TransformedBatch,
};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
