use crate::core::Pipeline;
use crate::domain::model::{AnalyticsSummary, LoadSummary, RawData, RunContext, TransformOutput};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extract,
    Transform,
    Load,
    Analytics,
    Full,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
            Stage::Analytics => "analytics",
            Stage::Full => "full",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractStageSummary {
    pub users: usize,
    pub posts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformStageSummary {
    pub users_processed: usize,
    pub users_rejected: usize,
    pub posts_processed: usize,
    pub posts_rejected: usize,
    /// Rejection counts by reason across both entities.
    pub rejections: BTreeMap<String, usize>,
    pub cancelled: bool,
}

impl TransformStageSummary {
    fn from_output(output: &TransformOutput) -> Self {
        let mut rejections = BTreeMap::new();
        let counts = output
            .users
            .reason_counts()
            .into_iter()
            .chain(output.posts.reason_counts());
        for (reason, count) in counts {
            *rejections.entry(reason.to_string()).or_insert(0) += count;
        }

        Self {
            users_processed: output.users.processed.len(),
            users_rejected: output.users.rejected.len(),
            posts_processed: output.posts.processed.len(),
            posts_rejected: output.posts.rejected.len(),
            rejections,
            cancelled: output.users.cancelled || output.posts.cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub stage: Stage,
    pub partition: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub extract: Option<ExtractStageSummary>,
    pub transform: Option<TransformStageSummary>,
    pub load: Option<LoadSummary>,
    pub analytics: Option<AnalyticsSummary>,
}

impl RunSummary {
    fn started(stage: Stage, run: &RunContext) -> Self {
        let now = Utc::now();
        Self {
            stage,
            partition: run.partition.clone(),
            started_at: now,
            finished_at: now,
            duration_seconds: 0.0,
            extract: None,
            transform: None,
            load: None,
            analytics: None,
        }
    }
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self, stage: Stage, run: &RunContext) -> Result<RunSummary> {
        let mut summary = RunSummary::started(stage, run);
        tracing::info!("🚀 Running stage '{}' for partition {}", stage, run.partition);

        match stage {
            Stage::Extract => {
                self.extract(run, &mut summary).await?;
            }
            Stage::Transform => {
                let raw = self.pipeline.read_raw(run).await?;
                self.transform(raw, run, &mut summary).await?;
            }
            Stage::Load => {
                let output = self.pipeline.read_processed(run).await?;
                self.load(&output, run, &mut summary).await?;
            }
            Stage::Analytics => {
                self.analyze(run, &mut summary).await?;
            }
            Stage::Full => {
                let raw = self.extract(run, &mut summary).await?;
                let output = self.transform(raw, run, &mut summary).await?;
                if output.users.cancelled || output.posts.cancelled {
                    tracing::warn!("⏹️ Transform was cancelled; skipping load and analytics");
                } else {
                    self.load(&output, run, &mut summary).await?;
                    self.analyze(run, &mut summary).await?;
                }
            }
        }

        summary.finished_at = Utc::now();
        summary.duration_seconds =
            (summary.finished_at - summary.started_at).num_milliseconds() as f64 / 1000.0;
        tracing::info!(
            "✅ Stage '{}' completed in {:.2} seconds",
            stage,
            summary.duration_seconds
        );
        Ok(summary)
    }

    async fn extract(&self, run: &RunContext, summary: &mut RunSummary) -> Result<RawData> {
        tracing::info!("=== STAGE 1: DATA EXTRACTION ===");
        let raw = self.pipeline.extract(run).await?;
        tracing::info!(
            "Extraction completed: {} users, {} posts",
            raw.users.len(),
            raw.posts.len()
        );
        summary.extract = Some(ExtractStageSummary {
            users: raw.users.len(),
            posts: raw.posts.len(),
        });
        self.monitor.log_stage("extract");
        Ok(raw)
    }

    async fn transform(
        &self,
        raw: RawData,
        run: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<TransformOutput> {
        tracing::info!("=== STAGE 2: DATA TRANSFORMATION ===");
        let output = self.pipeline.transform(raw, run).await?;
        let stage_summary = TransformStageSummary::from_output(&output);
        tracing::info!(
            "Transformation completed: {} users, {} posts ({} rejected)",
            stage_summary.users_processed,
            stage_summary.posts_processed,
            stage_summary.users_rejected + stage_summary.posts_rejected
        );
        summary.transform = Some(stage_summary);
        self.monitor.log_stage("transform");
        Ok(output)
    }

    async fn load(
        &self,
        output: &TransformOutput,
        run: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<()> {
        tracing::info!("=== STAGE 3: LOAD TO STORAGE ===");
        let load = self.pipeline.load(output, run).await?;
        tracing::info!(
            "Loading completed: {} user rows, {} post rows in warehouse",
            load.users.total_rows,
            load.posts.total_rows
        );
        summary.load = Some(load);
        self.monitor.log_stage("load");
        Ok(())
    }

    async fn analyze(&self, run: &RunContext, summary: &mut RunSummary) -> Result<()> {
        tracing::info!("=== STAGE 4: ANALYTICS AND REPORTS ===");
        let analytics = self.pipeline.analyze(run).await?;
        tracing::info!(
            "Analytics completed: {} CSV files, JSON report at {}",
            analytics.csv_files.len(),
            analytics.json_report
        );
        summary.analytics = Some(analytics);
        self.monitor.log_stage("analytics");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        EntityKind, RawRecord, RejectReason, Rejection, TableLoadSummary, TransformedBatch,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockPipeline {
        calls: std::sync::Mutex<Vec<&'static str>>,
        cancelled: bool,
        transforms: AtomicUsize,
    }

    impl MockPipeline {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn table(name: &str) -> TableLoadSummary {
        TableLoadSummary {
            table: name.to_string(),
            inserted: 0,
            updated: 0,
            total_rows: 0,
            csv_path: String::new(),
        }
    }

    #[async_trait::async_trait]
    impl Pipeline for MockPipeline {
        async fn extract(&self, _run: &RunContext) -> Result<RawData> {
            self.record("extract");
            Ok(RawData {
                users: vec![RawRecord::default()],
                posts: vec![],
            })
        }

        async fn read_raw(&self, _run: &RunContext) -> Result<RawData> {
            self.record("read_raw");
            Ok(RawData::default())
        }

        async fn transform(&self, raw: RawData, _run: &RunContext) -> Result<TransformOutput> {
            self.record("transform");
            self.transforms.fetch_add(1, Ordering::SeqCst);
            let mut users = TransformedBatch::empty(EntityKind::User);
            users.rejected = (0..raw.users.len())
                .map(|index| Rejection {
                    index,
                    reason: RejectReason::MissingId,
                })
                .collect();
            users.cancelled = self.cancelled;
            Ok(TransformOutput {
                users,
                posts: TransformedBatch::empty(EntityKind::Post),
            })
        }

        async fn read_processed(&self, _run: &RunContext) -> Result<TransformOutput> {
            self.record("read_processed");
            Ok(TransformOutput {
                users: TransformedBatch::empty(EntityKind::User),
                posts: TransformedBatch::empty(EntityKind::Post),
            })
        }

        async fn load(&self, _output: &TransformOutput, _run: &RunContext) -> Result<LoadSummary> {
            self.record("load");
            Ok(LoadSummary {
                users: table("users"),
                posts: table("posts"),
                bundle_path: None,
            })
        }

        async fn analyze(&self, _run: &RunContext) -> Result<AnalyticsSummary> {
            self.record("analyze");
            Ok(AnalyticsSummary {
                json_report: "reports/summary.json".to_string(),
                csv_files: vec![],
                queries_executed: vec![],
            })
        }
    }

    fn run() -> RunContext {
        RunContext::new(Utc::now())
    }

    #[tokio::test]
    async fn test_full_runs_every_stage_in_order() {
        let engine = EtlEngine::new(MockPipeline::default());
        let summary = engine.run(Stage::Full, &run()).await.unwrap();

        assert_eq!(engine.pipeline().calls(), vec!["extract", "transform", "load", "analyze"]);
        assert_eq!(summary.extract, Some(ExtractStageSummary { users: 1, posts: 0 }));
        let transform = summary.transform.unwrap();
        assert_eq!(transform.users_rejected, 1);
        assert_eq!(transform.rejections["missing_id"], 1);
        assert!(summary.load.is_some());
        assert!(summary.analytics.is_some());
    }

    #[tokio::test]
    async fn test_single_stages_read_previous_output() {
        let engine = EtlEngine::new(MockPipeline::default());
        engine.run(Stage::Transform, &run()).await.unwrap();
        engine.run(Stage::Load, &run()).await.unwrap();
        engine.run(Stage::Analytics, &run()).await.unwrap();

        assert_eq!(
            engine.pipeline().calls(),
            vec!["read_raw", "transform", "read_processed", "load", "analyze"]
        );
    }

    #[tokio::test]
    async fn test_cancelled_transform_skips_load() {
        let engine = EtlEngine::new(MockPipeline {
            cancelled: true,
            ..MockPipeline::default()
        });
        let summary = engine.run(Stage::Full, &run()).await.unwrap();

        assert_eq!(engine.pipeline().calls(), vec!["extract", "transform"]);
        assert!(summary.transform.unwrap().cancelled);
        assert!(summary.load.is_none());
        assert_eq!(engine.pipeline().transforms.load(Ordering::SeqCst), 1);
    }
}
