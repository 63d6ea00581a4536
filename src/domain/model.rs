use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::error::EtlError;

/// One decoded JSON object from the source API. Nothing about its shape is trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl RawRecord {
    pub fn new(data: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { data }
    }

    /// Returns `None` for anything that is not a JSON object.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(data) => Some(Self { data }),
            _ => None,
        }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for RawRecord {
    fn from(data: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Post,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::User, EntityKind::Post];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Post => "post",
        }
    }

    /// API path segment and file stem, e.g. `users`.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Post => "posts",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(EntityKind::User),
            "post" | "posts" => Ok(EntityKind::Post),
            other => Err(EtlError::InvalidConfigValueError {
                field: "entity_kind".to_string(),
                value: other.to_string(),
                reason: "Expected one of: user, post".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedUser {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub city: String,
    pub zipcode: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub company_name: String,
    pub company_catchphrase: String,
    pub email_domain: String,
    pub has_coordinates: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCategory {
    Short,
    Medium,
    Long,
}

impl PostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostCategory::Short => "short",
            PostCategory::Medium => "medium",
            PostCategory::Long => "long",
        }
    }
}

impl fmt::Display for PostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPost {
    pub post_id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub title_length: usize,
    pub body_length: usize,
    pub word_count: usize,
    pub post_category: PostCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProcessedRecord {
    User(ProcessedUser),
    Post(ProcessedPost),
}

impl ProcessedRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            ProcessedRecord::User(_) => EntityKind::User,
            ProcessedRecord::Post(_) => EntityKind::Post,
        }
    }

    /// Primary key of the underlying row.
    pub fn id(&self) -> i64 {
        match self {
            ProcessedRecord::User(user) => user.user_id,
            ProcessedRecord::Post(post) => post.post_id,
        }
    }
}

impl From<ProcessedUser> for ProcessedRecord {
    fn from(user: ProcessedUser) -> Self {
        ProcessedRecord::User(user)
    }
}

impl From<ProcessedPost> for ProcessedRecord {
    fn from(post: ProcessedPost) -> Self {
        ProcessedRecord::Post(post)
    }
}

/// Why a raw record was excluded. Only identifiers are non-synthesizable.
#[derive(
    thiserror::Error,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("missing_id")]
    MissingId,
    #[error("missing_user_id")]
    MissingUserId,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingId => "missing_id",
            RejectReason::MissingUserId => "missing_user_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub index: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldIssue {
    Absent,
    WrongType,
}

/// Counts of silently degraded fields, keyed by raw path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDiagnostics {
    counts: BTreeMap<(&'static str, FieldIssue), usize>,
}

impl FieldDiagnostics {
    pub fn record(&mut self, field: &'static str, issue: FieldIssue) {
        *self.counts.entry((field, issue)).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: FieldDiagnostics) {
        for (key, count) in other.counts {
            *self.counts.entry(key).or_insert(0) += count;
        }
    }

    pub fn count(&self, field: &str, issue: FieldIssue) -> usize {
        self.counts
            .iter()
            .filter(|((f, i), _)| *f == field && *i == issue)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FieldIssue, usize)> + '_ {
        self.counts
            .iter()
            .map(|((field, issue), count)| (*field, *issue, *count))
    }
}

/// Output of one driver run, ready for the storage stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedBatch<T> {
    pub kind: EntityKind,
    pub processed: Vec<T>,
    pub rejected: Vec<Rejection>,
    pub diagnostics: FieldDiagnostics,
    /// Set when a cancellation signal stopped the run before the end of input.
    pub cancelled: bool,
}

impl<T> TransformedBatch<T> {
    pub fn empty(kind: EntityKind) -> Self {
        Self {
            kind,
            processed: Vec::new(),
            rejected: Vec::new(),
            diagnostics: FieldDiagnostics::default(),
            cancelled: false,
        }
    }

    pub fn total_seen(&self) -> usize {
        self.processed.len() + self.rejected.len()
    }

    pub fn reason_counts(&self) -> BTreeMap<RejectReason, usize> {
        let mut counts = BTreeMap::new();
        for rejection in &self.rejected {
            *counts.entry(rejection.reason).or_insert(0) += 1;
        }
        counts
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> TransformedBatch<U> {
        TransformedBatch {
            kind: self.kind,
            processed: self.processed.into_iter().map(f).collect(),
            rejected: self.rejected,
            diagnostics: self.diagnostics,
            cancelled: self.cancelled,
        }
    }
}

/// Identity of one pipeline run: the transform timestamp and the
/// `YYYY-MM-DD` partition its files live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_timestamp: DateTime<Utc>,
    pub partition: String,
}

impl RunContext {
    pub fn new(run_timestamp: DateTime<Utc>) -> Self {
        Self {
            run_timestamp,
            partition: run_timestamp.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    pub fn raw_path(&self, kind: EntityKind) -> String {
        format!("raw/{}/{}.json", self.partition, kind.collection())
    }

    pub fn processed_path(&self, kind: EntityKind, extension: &str) -> String {
        format!("processed/{}/{}.{}", self.partition, kind.collection(), extension)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawData {
    pub users: Vec<RawRecord>,
    pub posts: Vec<RawRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub users: TransformedBatch<ProcessedUser>,
    pub posts: TransformedBatch<ProcessedPost>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoadSummary {
    pub table: String,
    pub inserted: usize,
    pub updated: usize,
    pub total_rows: usize,
    pub csv_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub users: TableLoadSummary,
    pub posts: TableLoadSummary,
    pub bundle_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub json_report: String,
    pub csv_files: Vec<String>,
    pub queries_executed: Vec<String>,
}
