use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::record::{PostTransformer, RecordTransformer, TransformContext, UserTransformer};
use crate::domain::model::{
    EntityKind, FieldDiagnostics, ProcessedPost, ProcessedRecord, ProcessedUser, RawRecord,
    Rejection, TransformedBatch,
};

pub const DEFAULT_CHUNK_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Transform chunks on the rayon pool instead of the calling thread.
    pub parallel: bool,
    pub chunk_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl BatchOptions {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }
}

/// Cooperative stop signal, checked before each record.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct ChunkOutcome<T> {
    processed: Vec<T>,
    rejected: Vec<Rejection>,
    diagnostics: FieldDiagnostics,
    cancelled: bool,
}

fn transform_chunk<T: RecordTransformer>(
    transformer: &T,
    chunk: &[RawRecord],
    offset: usize,
    ctx: &TransformContext,
    cancel: &CancelFlag,
) -> ChunkOutcome<T::Output> {
    let mut outcome = ChunkOutcome {
        processed: Vec::with_capacity(chunk.len()),
        rejected: Vec::new(),
        diagnostics: FieldDiagnostics::default(),
        cancelled: false,
    };

    for (i, raw) in chunk.iter().enumerate() {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }
        match transformer.transform(raw, ctx, &mut outcome.diagnostics) {
            Ok(record) => outcome.processed.push(record),
            Err(reason) => outcome.rejected.push(Rejection {
                index: offset + i,
                reason,
            }),
        }
    }

    outcome
}

/// Applies a record transformer across a batch of raw records.
///
/// Processed records keep input order and rejection indices refer to
/// positions in the input slice, in both sequential and parallel mode.
/// Per-record problems never fail the batch. When the cancel flag is raised
/// the records already finished are returned and `cancelled` is set; in
/// parallel mode each chunk stops independently, so the finished set may
/// not be a prefix of the input.
#[derive(Debug, Clone)]
pub struct BatchTransformer {
    ctx: TransformContext,
    options: BatchOptions,
    cancel: CancelFlag,
}

impl BatchTransformer {
    pub fn new(run_timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            ctx: TransformContext::new(run_timestamp),
            options: BatchOptions::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn context(&self) -> &TransformContext {
        &self.ctx
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    pub fn run<T: RecordTransformer>(
        &self,
        transformer: &T,
        records: &[RawRecord],
    ) -> TransformedBatch<T::Output> {
        let chunk_size = self.options.chunk_size.max(1);

        let parallel = self.options.parallel && records.len() > chunk_size;
        let outcomes: Vec<ChunkOutcome<T::Output>> = if parallel {
            records
                .par_chunks(chunk_size)
                .enumerate()
                .map(|(i, chunk)| {
                    transform_chunk(transformer, chunk, i * chunk_size, &self.ctx, &self.cancel)
                })
                .collect()
        } else {
            vec![transform_chunk(
                transformer,
                records,
                0,
                &self.ctx,
                &self.cancel,
            )]
        };

        let mut batch = TransformedBatch::empty(transformer.kind());
        for outcome in outcomes {
            batch.processed.extend(outcome.processed);
            batch.rejected.extend(outcome.rejected);
            batch.diagnostics.merge(outcome.diagnostics);
            batch.cancelled |= outcome.cancelled;
        }

        log_batch(&batch, records.len());
        batch
    }

    pub fn transform_users(&self, records: &[RawRecord]) -> TransformedBatch<ProcessedUser> {
        self.run(&UserTransformer, records)
    }

    pub fn transform_posts(&self, records: &[RawRecord]) -> TransformedBatch<ProcessedPost> {
        self.run(&PostTransformer, records)
    }

    pub fn transform(
        &self,
        records: &[RawRecord],
        kind: EntityKind,
    ) -> TransformedBatch<ProcessedRecord> {
        match kind {
            EntityKind::User => self.transform_users(records).map(ProcessedRecord::from),
            EntityKind::Post => self.transform_posts(records).map(ProcessedRecord::from),
        }
    }
}

fn log_batch<T>(batch: &TransformedBatch<T>, input_len: usize) {
    for rejection in &batch.rejected {
        tracing::warn!(
            "⚠️ Rejected {} record at index {}: {}",
            batch.kind,
            rejection.index,
            rejection.reason
        );
    }

    if !batch.diagnostics.is_empty() {
        for (field, issue, count) in batch.diagnostics.iter() {
            tracing::debug!(
                "🔧 {}: '{}' degraded ({:?}) in {} records",
                batch.kind,
                field,
                issue,
                count
            );
        }
    }

    let reasons: Vec<String> = batch
        .reason_counts()
        .iter()
        .map(|(reason, count)| format!("{}={}", reason, count))
        .collect();

    tracing::info!(
        "🔄 Transformed {} {} records: {} processed, {} rejected{}",
        input_len,
        batch.kind,
        batch.processed.len(),
        batch.rejected.len(),
        if reasons.is_empty() {
            String::new()
        } else {
            format!(" ({})", reasons.join(", "))
        }
    );

    if batch.cancelled {
        tracing::warn!(
            "⏹️ {} batch cancelled after {} of {} records",
            batch.kind,
            batch.total_seen(),
            input_len
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RejectReason;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::Level;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Records the level and message of every event.
    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

    impl CapturedEvents {
        fn messages(&self, level: Level) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    struct MessageVisitor<'a>(&'a mut String);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                *self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.0.lock().unwrap().push((*event.metadata().level(), message));
        }
    }

    fn batch_transformer() -> BatchTransformer {
        BatchTransformer::new(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
    }

    fn posts(n: usize) -> Vec<RawRecord> {
        (0..n)
            .map(|i| {
                let value = if i % 7 == 3 {
                    json!({"id": i, "title": "orphan"})
                } else if i % 11 == 5 {
                    json!({"userId": 1, "title": "no id"})
                } else {
                    json!({
                        "id": i,
                        "userId": i % 10,
                        "title": format!("post {}", i),
                        "body": "x ".repeat(i)
                    })
                };
                RawRecord::from_value(value).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_empty_batch() {
        let batch = batch_transformer().transform_users(&[]);
        assert!(batch.processed.is_empty());
        assert!(batch.rejected.is_empty());
        assert!(!batch.cancelled);
    }

    #[test]
    fn test_rejections_keep_input_indices() {
        let records = vec![
            RawRecord::from_value(json!({"id": 1, "userId": 1})).unwrap(),
            RawRecord::from_value(json!({"userId": 1})).unwrap(),
            RawRecord::from_value(json!({"id": 3})).unwrap(),
            RawRecord::from_value(json!({"id": 4, "userId": 2})).unwrap(),
        ];
        let batch = batch_transformer().transform_posts(&records);
        let ids: Vec<i64> = batch.processed.iter().map(|p| p.post_id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(
            batch.rejected,
            vec![
                Rejection {
                    index: 1,
                    reason: RejectReason::MissingId,
                },
                Rejection {
                    index: 2,
                    reason: RejectReason::MissingUserId,
                },
            ]
        );
    }

    #[test]
    fn test_one_warning_per_rejection_and_summary() {
        let records = vec![
            RawRecord::from_value(json!({"id": 1, "userId": 1})).unwrap(),
            RawRecord::from_value(json!({"userId": 1})).unwrap(),
            RawRecord::from_value(json!({"id": 3})).unwrap(),
            RawRecord::from_value(json!({"id": 4, "userId": 2})).unwrap(),
        ];
        let events = CapturedEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());

        let batch = tracing::subscriber::with_default(subscriber, || {
            batch_transformer()
                .with_options(BatchOptions::sequential())
                .transform_posts(&records)
        });

        let warnings = events.messages(Level::WARN);
        assert_eq!(warnings.len(), batch.rejected.len());
        assert!(warnings[0].contains("index 1: missing_id"));
        assert!(warnings[1].contains("index 2: missing_user_id"));

        let summaries: Vec<String> = events
            .messages(Level::INFO)
            .into_iter()
            .filter(|m| m.contains("Transformed"))
            .collect();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].contains("2 processed, 2 rejected (missing_id=1, missing_user_id=1)"));
    }

    #[test]
    fn test_full_rejection_still_succeeds() {
        let records: Vec<RawRecord> = (0..5)
            .map(|_| RawRecord::from_value(json!({"username": "ghost"})).unwrap())
            .collect();
        let batch = batch_transformer().transform_users(&records);
        assert!(batch.processed.is_empty());
        assert_eq!(batch.rejected.len(), 5);
        assert_eq!(batch.reason_counts()[&RejectReason::MissingId], 5);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let records = posts(500);
        let sequential = batch_transformer()
            .with_options(BatchOptions::sequential())
            .transform_posts(&records);
        let parallel = batch_transformer()
            .with_options(BatchOptions {
                parallel: true,
                chunk_size: 16,
            })
            .transform_posts(&records);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.total_seen(), 500);
    }

    #[test]
    fn test_cancelled_before_start_returns_nothing() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let batch = batch_transformer()
            .with_cancel_flag(cancel)
            .transform_posts(&posts(20));
        assert!(batch.cancelled);
        assert_eq!(batch.total_seen(), 0);
    }

    #[test]
    fn test_cancel_mid_run_returns_whole_records() {
        struct CancelAfter {
            after: usize,
            seen: std::sync::atomic::AtomicUsize,
            cancel: CancelFlag,
        }

        impl RecordTransformer for CancelAfter {
            type Output = usize;

            fn kind(&self) -> EntityKind {
                EntityKind::Post
            }

            fn transform(
                &self,
                _raw: &RawRecord,
                _ctx: &TransformContext,
                _diagnostics: &mut FieldDiagnostics,
            ) -> Result<usize, RejectReason> {
                let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
                if n == self.after {
                    self.cancel.cancel();
                }
                Ok(n)
            }
        }

        let cancel = CancelFlag::new();
        let transformer = CancelAfter {
            after: 3,
            seen: std::sync::atomic::AtomicUsize::new(0),
            cancel: cancel.clone(),
        };
        let batch = batch_transformer()
            .with_options(BatchOptions::sequential())
            .with_cancel_flag(cancel)
            .run(&transformer, &posts(10));
        assert!(batch.cancelled);
        assert_eq!(batch.processed, vec![1, 2, 3]);
    }

    #[test]
    fn test_kind_dispatch_wraps_records() {
        let records = vec![RawRecord::from_value(json!({"id": 8, "username": "Kamren"})).unwrap()];
        let batch = batch_transformer().transform(&records, EntityKind::User);
        assert_eq!(batch.kind, EntityKind::User);
        assert_eq!(batch.processed.len(), 1);
        assert_eq!(batch.processed[0].kind(), EntityKind::User);
        assert_eq!(batch.processed[0].id(), 8);
    }

    #[test]
    fn test_shared_run_timestamp() {
        let bt = batch_transformer();
        let batch = bt.transform_posts(&posts(30));
        assert!(batch
            .processed
            .iter()
            .all(|p| p.created_at == bt.context().run_timestamp));
    }
}
