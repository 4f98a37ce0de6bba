use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::records::{Row, Table};

use super::{StoreError, TableSnapshot, TableStore, UNPROVISIONED};

/// One CSV file per table inside a directory.
///
/// The version token is the CRC32 of the file contents, so edits made by
/// hand between our read and our write are detected too. Writes go to a
/// temp file that is fsynced and renamed over the table. The version check
/// and the rename happen under an exclusive OS lock on `<table>.lock`, so
/// several stores (or processes) may share one directory.
///
/// Only the canonical columns are written back. Any extra column a sheet
/// carries is dropped on the first rewrite of that table.
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self, table: Table) -> PathBuf {
        self.dir.join(format!("{}.csv", table.name()))
    }

    async fn check_dir(&self) -> Result<(), StoreError> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StoreError::Unavailable(format!(
                "{} is not a directory",
                self.dir.display()
            ))),
            Err(e) => Err(StoreError::Unavailable(format!(
                "{}: {e}",
                self.dir.display()
            ))),
        }
    }

    /// Exclusive advisory lock on the table, released when the file is dropped.
    async fn lock_table(&self, table: Table) -> Result<std::fs::File, StoreError> {
        let path = self.dir.join(format!("{}.lock", table.name()));
        let file = tokio::task::spawn_blocking(move || -> io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(io::Error::other)??;
        Ok(file)
    }

    async fn load(&self, table: Table) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path(table)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn version_of(bytes: &[u8]) -> u64 {
    // High bit keeps an existing-but-empty file distinct from UNPROVISIONED.
    (1u64 << 32) | crc32fast::hash(bytes) as u64
}

/// Parse rows and project them onto the canonical column order by header
/// name. Missing columns read as empty, unknown columns are ignored.
/// Invalid UTF-8 is decoded lossily per field so one bad row cannot make
/// the whole table unreadable.
fn parse_rows(table: Table, bytes: &[u8]) -> Result<Vec<Row>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let file_headers: HashMap<String, usize> = reader
        .byte_headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (String::from_utf8_lossy(h).trim().to_string(), i))
        .collect();
    let projection: Vec<Option<usize>> = table
        .headers()
        .iter()
        .map(|h| file_headers.get(*h).copied())
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        if record.iter().all(|f| f.trim_ascii().is_empty()) {
            continue;
        }
        if std::str::from_utf8(record.as_slice()).is_err() {
            tracing::warn!(
                "{table}: row at line {} is not valid UTF-8, decoding lossily",
                record.position().map_or(0, |p| p.line())
            );
        }
        rows.push(
            projection
                .iter()
                .map(|idx| {
                    idx.and_then(|i| record.get(i))
                        .map(|f| String::from_utf8_lossy(f).into_owned())
                        .unwrap_or_default()
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn render_rows(table: Table, rows: &[Row]) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(table.headers())?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("csv.tmp");
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp_path, path).await
}

#[async_trait]
impl TableStore for FileStore {
    async fn read_table(&self, table: Table) -> Result<TableSnapshot, StoreError> {
        self.check_dir().await?;
        match self.load(table).await? {
            None => Ok(TableSnapshot::default()),
            Some(bytes) => Ok(TableSnapshot {
                version: version_of(&bytes),
                rows: parse_rows(table, &bytes)?,
            }),
        }
    }

    async fn write_table(
        &self,
        table: Table,
        rows: Vec<Row>,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        self.check_dir().await?;
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_table(table).await?;
        let found = self
            .load(table)
            .await?
            .map_or(UNPROVISIONED, |b| version_of(&b));
        if found != expected_version {
            return Err(StoreError::VersionMismatch {
                table,
                expected: expected_version,
                found,
            });
        }
        let bytes = render_rows(table, &rows)?;
        write_atomically(&self.path(table), &bytes).await?;
        tracing::debug!("wrote {} rows to {}", rows.len(), self.path(table).display());
        Ok(version_of(&bytes))
    }
}
