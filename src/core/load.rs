use crate::core::Storage;
use crate::domain::model::{EntityKind, ProcessedPost, ProcessedUser, RunContext, TableLoadSummary};
use crate::utils::error::{EtlError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// A processed row the storage stage can key and export.
pub trait TableRow: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync {
    const KIND: EntityKind;
    /// CSV header, matching the serialized field order.
    const COLUMNS: &'static [&'static str];

    fn primary_key(&self) -> i64;
}

impl TableRow for ProcessedUser {
    const KIND: EntityKind = EntityKind::User;
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "username",
        "name",
        "email",
        "phone",
        "website",
        "city",
        "zipcode",
        "lat",
        "lng",
        "company_name",
        "company_catchphrase",
        "email_domain",
        "has_coordinates",
        "created_at",
    ];

    fn primary_key(&self) -> i64 {
        self.user_id
    }
}

impl TableRow for ProcessedPost {
    const KIND: EntityKind = EntityKind::Post;
    const COLUMNS: &'static [&'static str] = &[
        "post_id",
        "user_id",
        "title",
        "body",
        "title_length",
        "body_length",
        "word_count",
        "post_category",
        "created_at",
    ];

    fn primary_key(&self) -> i64 {
        self.post_id
    }
}

pub fn table_path(kind: EntityKind) -> String {
    format!("warehouse/{}.json", kind.collection())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
    pub total_rows: usize,
}

/// Persists processed rows: per-run JSON snapshots and CSV exports, plus a
/// warehouse table per entity keyed by primary id.
pub struct TableLoader<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> TableLoader<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    pub async fn save_processed<T: TableRow>(
        &self,
        run: &RunContext,
        rows: &[T],
    ) -> Result<String> {
        let path = run.processed_path(T::KIND, "json");
        let data = serde_json::to_vec_pretty(rows)?;
        self.storage.write_file(&path, &data).await?;
        tracing::info!("💾 Saved {} processed {} to {}", rows.len(), T::KIND.collection(), path);
        Ok(path)
    }

    pub async fn read_processed<T: TableRow>(&self, run: &RunContext) -> Result<Vec<T>> {
        let path = run.processed_path(T::KIND, "json");
        let data = self.storage.read_file(&path).await?;
        let rows: Vec<T> = serde_json::from_slice(&data)?;
        tracing::info!(
            "📂 Loaded {} processed {} from {}",
            rows.len(),
            T::KIND.collection(),
            path
        );
        Ok(rows)
    }

    /// Current warehouse rows ordered by primary id; a table never written is empty.
    pub async fn read_table<T: TableRow>(&self) -> Result<Vec<T>> {
        match self.storage.read_file(&table_path(T::KIND)).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(EtlError::MissingInputError { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Inserts new ids and replaces existing ones. Loading the same rows
    /// twice leaves the table as it was.
    pub async fn upsert<T: TableRow>(&self, rows: &[T]) -> Result<UpsertCounts> {
        let mut table: BTreeMap<i64, T> = self
            .read_table::<T>()
            .await?
            .into_iter()
            .map(|row| (row.primary_key(), row))
            .collect();

        let mut counts = UpsertCounts::default();
        for row in rows {
            match table.insert(row.primary_key(), row.clone()) {
                None => counts.inserted += 1,
                Some(previous) if previous != *row => counts.updated += 1,
                Some(_) => {}
            }
        }
        counts.total_rows = table.len();

        let ordered: Vec<&T> = table.values().collect();
        let data = serde_json::to_vec_pretty(&ordered)?;
        self.storage.write_file(&table_path(T::KIND), &data).await?;

        tracing::info!(
            "🗄️ Upserted {} {}: {} inserted, {} updated, {} rows total",
            rows.len(),
            T::KIND.collection(),
            counts.inserted,
            counts.updated,
            counts.total_rows
        );
        Ok(counts)
    }

    pub async fn export_csv<T: TableRow>(
        &self,
        run: &RunContext,
        rows: &[T],
    ) -> Result<(String, Vec<u8>)> {
        let path = run.processed_path(T::KIND, "csv");
        let data = render_csv(rows)?;
        self.storage.write_file(&path, &data).await?;
        tracing::debug!("💾 Wrote {} ({} bytes)", path, data.len());
        Ok((path, data))
    }

    /// Full storage step for one entity: upsert then CSV export.
    pub async fn load_table<T: TableRow>(
        &self,
        run: &RunContext,
        rows: &[T],
    ) -> Result<(TableLoadSummary, Vec<u8>)> {
        let counts = self.upsert(rows).await?;
        let (csv_path, csv_data) = self.export_csv(run, rows).await?;
        Ok((
            TableLoadSummary {
                table: T::KIND.collection().to_string(),
                inserted: counts.inserted,
                updated: counts.updated,
                total_rows: counts.total_rows,
                csv_path,
            },
            csv_data,
        ))
    }

    pub async fn write_bundle(
        &self,
        run: &RunContext,
        files: &[(String, Vec<u8>)],
    ) -> Result<String> {
        let path = format!("processed/{}/bundle.zip", run.partition);
        let data = zip_files(files)?;
        tracing::debug!(
            "📦 Writing ZIP bundle with {} files ({} bytes)",
            files.len(),
            data.len()
        );
        self.storage.write_file(&path, &data).await?;
        Ok(path)
    }
}

pub fn render_csv<T: TableRow>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(T::COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| EtlError::IoError(e.into_error()))
}

fn zip_files(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
