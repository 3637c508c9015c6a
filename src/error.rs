use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Required file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: record on line {line} has {found} fields, header has {expected}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    #[error("Invalid pipeline: {0}")]
    Pipeline(String),
}

impl MigrationError {
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        MigrationError::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        MigrationError::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
