pub mod config;
pub mod core;
pub mod domain;
pub mod transform;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::toml_config::TomlConfig;

pub use core::etl::{EtlEngine, RunSummary, Stage};
pub use core::pipeline::PlaceholderPipeline;
pub use transform::{BatchOptions, BatchTransformer, CancelFlag};
pub use utils::error::{EtlError, Result};
