use crate::domain::model::{AnalyticsSummary, LoadSummary, RawData, RunContext, TransformOutput};
use crate::transform::BatchOptions;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn output_path(&self) -> &str;
    fn request_timeout_seconds(&self) -> u64;
    fn batch_options(&self) -> BatchOptions;
    /// Also pack the CSV exports into a ZIP next to them.
    fn bundle_outputs(&self) -> bool;
}

/// The four stages. `read_*` pick up a previous run's persisted output so a
/// single stage can run on its own.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, run: &RunContext) -> Result<RawData>;
    async fn read_raw(&self, run: &RunContext) -> Result<RawData>;
    async fn transform(&self, raw: RawData, run: &RunContext) -> Result<TransformOutput>;
    async fn read_processed(&self, run: &RunContext) -> Result<TransformOutput>;
    async fn load(&self, output: &TransformOutput, run: &RunContext) -> Result<LoadSummary>;
    async fn analyze(&self, run: &RunContext) -> Result<AnalyticsSummary>;
}
