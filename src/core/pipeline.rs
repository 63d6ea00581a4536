use crate::core::analytics::{self, report_stamp};
use crate::core::extract::{into_raw_records, HttpExtractor};
use crate::core::load::TableLoader;
use crate::core::{ConfigProvider, Pipeline, RawRecord, Storage};
use crate::domain::model::{
    AnalyticsSummary, EntityKind, LoadSummary, ProcessedPost, ProcessedUser, RawData, RunContext,
    TransformOutput, TransformedBatch,
};
use crate::transform::{BatchTransformer, CancelFlag};
use crate::utils::error::{EtlError, Result};

/// Users-and-posts pipeline over a REST source and a [`Storage`] backend.
pub struct PlaceholderPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    extractor: HttpExtractor,
    cancel: CancelFlag,
}

impl<S: Storage, C: ConfigProvider> PlaceholderPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        let extractor = HttpExtractor::new(config.api_base_url(), config.request_timeout_seconds());
        Self {
            storage,
            config,
            extractor,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn extract_kind(&self, run: &RunContext, kind: EntityKind) -> Result<Vec<RawRecord>> {
        let items = self.extractor.fetch(kind).await?;

        let path = run.raw_path(kind);
        let data = serde_json::to_vec_pretty(&items)?;
        self.storage.write_file(&path, &data).await?;
        tracing::info!("💾 Saved raw {} to {}", kind.collection(), path);

        Ok(into_raw_records(items, kind))
    }

    async fn read_raw_kind(&self, run: &RunContext, kind: EntityKind) -> Result<Vec<RawRecord>> {
        let path = run.raw_path(kind);
        let data = self.storage.read_file(&path).await?;
        let items: Vec<serde_json::Value> = serde_json::from_slice(&data)?;
        tracing::info!("📂 Loaded {} raw {} from {}", items.len(), kind.collection(), path);
        Ok(into_raw_records(items, kind))
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for PlaceholderPipeline<S, C> {
    async fn extract(&self, run: &RunContext) -> Result<RawData> {
        let users = self.extract_kind(run, EntityKind::User).await?;
        let posts = self.extract_kind(run, EntityKind::Post).await?;
        Ok(RawData { users, posts })
    }

    async fn read_raw(&self, run: &RunContext) -> Result<RawData> {
        let users = self.read_raw_kind(run, EntityKind::User).await?;
        let posts = self.read_raw_kind(run, EntityKind::Post).await?;
        Ok(RawData { users, posts })
    }

    async fn transform(&self, raw: RawData, run: &RunContext) -> Result<TransformOutput> {
        let transformer = BatchTransformer::new(run.run_timestamp)
            .with_options(self.config.batch_options())
            .with_cancel_flag(self.cancel.clone());

        // rayon does the work; keep it off the async workers
        let (users, posts) = tokio::task::spawn_blocking(move || {
            let users = transformer.transform_users(&raw.users);
            let posts = transformer.transform_posts(&raw.posts);
            (users, posts)
        })
        .await
        .map_err(|e| EtlError::ProcessingError {
            message: format!("Transform task failed: {}", e),
        })?;

        // a partial snapshot would be loaded later as if it were complete
        if users.cancelled || posts.cancelled {
            tracing::warn!(
                "⏹️ Transform cancelled; not writing processed snapshots for {}",
                run.partition
            );
        } else {
            let loader = TableLoader::new(&self.storage);
            loader.save_processed(run, &users.processed).await?;
            loader.save_processed(run, &posts.processed).await?;
        }

        Ok(TransformOutput { users, posts })
    }

    async fn read_processed(&self, run: &RunContext) -> Result<TransformOutput> {
        let loader = TableLoader::new(&self.storage);

        let mut users: TransformedBatch<ProcessedUser> = TransformedBatch::empty(EntityKind::User);
        users.processed = loader.read_processed(run).await?;

        let mut posts: TransformedBatch<ProcessedPost> = TransformedBatch::empty(EntityKind::Post);
        posts.processed = loader.read_processed(run).await?;

        Ok(TransformOutput { users, posts })
    }

    async fn load(&self, output: &TransformOutput, run: &RunContext) -> Result<LoadSummary> {
        let loader = TableLoader::new(&self.storage);

        let (users, users_csv) = loader.load_table(run, &output.users.processed).await?;
        let (posts, posts_csv) = loader.load_table(run, &output.posts.processed).await?;

        let bundle_path = if self.config.bundle_outputs() {
            let files = vec![
                (format!("{}.csv", EntityKind::User.collection()), users_csv),
                (format!("{}.csv", EntityKind::Post.collection()), posts_csv),
            ];
            Some(loader.write_bundle(run, &files).await?)
        } else {
            None
        };

        Ok(LoadSummary {
            users,
            posts,
            bundle_path,
        })
    }

    async fn analyze(&self, run: &RunContext) -> Result<AnalyticsSummary> {
        let loader = TableLoader::new(&self.storage);
        let users: Vec<ProcessedUser> = loader.read_table().await?;
        let posts: Vec<ProcessedPost> = loader.read_table().await?;

        let report = analytics::generate_report(&users, &posts, run.run_timestamp, "warehouse")?;
        let stamp = report_stamp(run.run_timestamp);

        let mut csv_files = Vec::new();
        for (name, section) in &report.analytics {
            if section.data.is_empty() {
                continue;
            }
            let path = format!("reports/{}_{}.csv", name, stamp);
            self.storage.write_file(&path, &section.to_csv()?).await?;
            tracing::info!("📄 CSV saved: {}", path);
            csv_files.push(path);
        }

        let json_report = format!("reports/summary_report_{}.json", stamp);
        self.storage
            .write_file(&json_report, &serde_json::to_vec_pretty(&report)?)
            .await?;
        tracing::info!("📄 JSON report saved: {}", json_report);

        Ok(AnalyticsSummary {
            json_report,
            csv_files,
            queries_executed: report.analytics.keys().cloned().collect(),
        })
    }
}
