use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{MigrationError, Result};

/// A single cell; `None` is the missing marker (empty CSV field).
pub type Cell = Option<String>;

/// An in-memory tabular dataset with ordered columns.
///
/// Stages consume a table and hand back a new one, so each transform can be
/// exercised on its own with a small fixture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Summary of a table written to disk
#[derive(Debug, Clone)]
pub struct WrittenTable {
    pub path: PathBuf,
    pub rows: usize,
    pub sha256: String,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from literal rows. Short rows are padded with missing cells.
    pub fn from_rows(name: impl Into<String>, columns: &[&str], rows: Vec<Vec<Cell>>) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Read a CSV file with a header row. Fails with `FileNotFound` when the
    /// file is absent.
    pub fn read_csv(path: &Path, name: impl Into<String>) -> Result<Self> {
        if !path.exists() {
            return Err(MigrationError::FileNotFound(path.to_path_buf()));
        }
        let file = fs::File::open(path)?;
        let table = Self::from_reader(file, name, path)?;
        info!(
            table = %table.name,
            path = %path.display(),
            rows = table.len(),
            "Loaded table"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, name: impl Into<String>, origin: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| MigrationError::csv(origin, e))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        let width = columns.len();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| MigrationError::csv(origin, e))?;
            // Short rows are padded below; extra fields would be silently lost.
            if record.len() > width {
                return Err(MigrationError::MalformedRow {
                    path: origin.to_path_buf(),
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    expected: width,
                    found: record.len(),
                });
            }
            let mut row: Vec<Cell> = record
                .iter()
                .map(|value| {
                    if value.is_empty() {
                        None
                    } else {
                        Some(value.to_string())
                    }
                })
                .collect();
            row.resize(width, None);
            rows.push(row);
        }

        Ok(Self {
            name: name.into(),
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| MigrationError::missing_column(&self.name, column))
    }

    /// Value of `column` in `row`, `None` when missing or out of range.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// All values of one column in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<Option<&str>>> {
        let idx = self.require_column(column)?;
        Ok(self.rows.iter().map(|row| row[idx].as_deref()).collect())
    }

    /// Replace every value of an existing column with `f(old)`.
    pub fn map_column<F>(mut self, column: &str, mut f: F) -> Result<Self>
    where
        F: FnMut(Option<&str>) -> Cell,
    {
        let idx = self.require_column(column)?;
        for row in &mut self.rows {
            let mapped = f(row[idx].as_deref());
            row[idx] = mapped;
        }
        Ok(self)
    }

    /// Compute `target` from `source` row by row. The target column is
    /// overwritten in place when it exists and appended otherwise.
    pub fn derive_column<F>(mut self, source: &str, target: &str, mut f: F) -> Result<Self>
    where
        F: FnMut(Option<&str>) -> Cell,
    {
        let src = self.require_column(source)?;
        let dst = match self.column_index(target) {
            Some(idx) => idx,
            None => {
                self.columns.push(target.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
                self.columns.len() - 1
            }
        };
        for row in &mut self.rows {
            let derived = f(row[src].as_deref());
            row[dst] = derived;
        }
        Ok(self)
    }

    /// Remove the listed columns. Every listed column must exist.
    pub fn drop_columns(mut self, columns: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(columns.len());
        for column in columns {
            indices.push(self.require_column(column)?);
        }
        indices.sort_unstable();
        indices.dedup();

        for idx in indices.iter().rev() {
            self.columns.remove(*idx);
            for row in &mut self.rows {
                row.remove(*idx);
            }
        }
        debug!(table = %self.name, dropped = indices.len(), "Dropped columns");
        Ok(self)
    }

    /// Rename columns per `(from, to)` pairs; unknown source names are ignored.
    pub fn rename_columns(mut self, renames: &[(String, String)]) -> Self {
        for column in &mut self.columns {
            if let Some((_, to)) = renames.iter().find(|(from, _)| from == column) {
                *column = to.clone();
            }
        }
        self
    }

    /// Serialize to CSV bytes: header row, missing cells written empty,
    /// minimal quoting, `\n` line endings.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let origin = PathBuf::from(&self.name);
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer
            .write_record(&self.columns)
            .map_err(|e| MigrationError::csv(&origin, e))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
                .map_err(|e| MigrationError::csv(&origin, e))?;
        }

        writer
            .into_inner()
            .map_err(|e| MigrationError::Io(e.into_error()))
    }

    /// Write the table to `path`, creating parent directories.
    ///
    /// The bytes land in a sibling temporary file that is renamed into place,
    /// so a failed write never leaves a partial output behind.
    pub fn write_csv(&self, path: &Path) -> Result<WrittenTable> {
        let bytes = self.to_csv_bytes()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        if let Err(e) = fs::write(&tmp_path, &bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        fs::rename(&tmp_path, path)?;

        let sha256 = hex::encode(Sha256::digest(&bytes));
        info!(
            table = %self.name,
            path = %path.display(),
            rows = self.len(),
            sha256 = %sha256,
            "Saved processed table"
        );

        Ok(WrittenTable {
            path: path.to_path_buf(),
            rows: self.len(),
            sha256,
        })
    }
}
