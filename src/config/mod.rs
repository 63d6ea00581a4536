pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use args::{CliConfig, LogFormat};

#[cfg(feature = "cli")]
mod args {
    use crate::core::etl::Stage;
    use crate::core::ConfigProvider;
    use crate::transform::BatchOptions;
    use crate::utils::error::Result;
    use crate::utils::validation::{self, Validate};
    use clap::{Parser, ValueEnum};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
    pub enum LogFormat {
        Compact,
        Json,
    }

    #[derive(Debug, Clone, Parser)]
    #[command(name = "placeholder-etl")]
    #[command(about = "Extract, transform, load and report on JSONPlaceholder users and posts")]
    pub struct CliConfig {
        #[arg(long, default_value = "https://jsonplaceholder.typicode.com")]
        pub api_url: String,

        #[arg(long, default_value = "./data")]
        pub output_path: String,

        #[arg(long, value_enum, default_value_t = Stage::Full)]
        pub stage: Stage,

        /// Partition (YYYY-MM-DD) to read when running a single stage; defaults to today
        #[arg(long)]
        pub date: Option<String>,

        #[arg(long, default_value = "64")]
        pub chunk_size: usize,

        #[arg(long, help = "Transform on a single thread")]
        pub sequential: bool,

        #[arg(long, default_value = "30")]
        pub timeout_seconds: u64,

        #[arg(long, help = "Skip the ZIP bundle of CSV exports")]
        pub no_bundle: bool,

        /// TOML configuration file; replaces the source/transform/load flags above
        #[arg(short, long)]
        pub config: Option<String>,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Log CPU and memory usage after each stage")]
        pub monitor: bool,

        #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
        pub log_format: LogFormat,
    }

    impl ConfigProvider for CliConfig {
        fn api_base_url(&self) -> &str {
            &self.api_url
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn request_timeout_seconds(&self) -> u64 {
            self.timeout_seconds
        }

        fn batch_options(&self) -> BatchOptions {
            BatchOptions {
                parallel: !self.sequential,
                chunk_size: self.chunk_size,
            }
        }

        fn bundle_outputs(&self) -> bool {
            !self.no_bundle
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validation::validate_url("api_url", &self.api_url)?;
            validation::validate_path("output_path", &self.output_path)?;
            validation::validate_positive_number("chunk_size", self.chunk_size, 1)?;
            validation::validate_range("timeout_seconds", self.timeout_seconds, 1, 600)?;
            if let Some(date) = &self.date {
                validation::validate_partition_date("date", date)?;
            }
            Ok(())
        }
    }

}
