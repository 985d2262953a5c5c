//! Record sources.
//!
//! The review store is read in one full scan. The file source reads an
//! export of that scan, either a bare JSON array of records or the
//! `{ "Items": [...] }` object a table scan produces.

use crate::error::SourceError;
use crate::models::BatchRecord;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Anything that can return every stored batch record.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Read all records, unfiltered.
    async fn scan_all(&self) -> Result<Vec<BatchRecord>, SourceError>;
}

const UNEXPECTED_SHAPE: &str = "expected an array of records or an object with \"Items\"";

/// Splits a scan export into its rows.
///
/// Accepts a bare array or an object holding an `Items` array. Each row is
/// read leniently, so only an export of the wrong shape is an error.
fn parse_export(content: &str) -> Result<Vec<BatchRecord>, serde_json::Error> {
    use serde::de::Error;

    let rows = match serde_json::from_str::<Value>(content)? {
        Value::Array(rows) => rows,
        Value::Object(mut export) => match export.remove("Items") {
            Some(Value::Array(rows)) => rows,
            Some(_) => return Err(serde_json::Error::custom("\"Items\" is not an array")),
            None => return Err(serde_json::Error::custom(UNEXPECTED_SHAPE)),
        },
        _ => return Err(serde_json::Error::custom(UNEXPECTED_SHAPE)),
    };

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(position, row)| {
            serde_json::from_value(row).unwrap_or_else(|e| {
                warn!("Record #{} is not an object: {}", position, e);
                BatchRecord::default()
            })
        })
        .collect())
}

/// Reads records from a JSON scan export on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn scan_all(&self) -> Result<Vec<BatchRecord>, SourceError> {
        info!("Scanning records from {}", self.path.display());

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;

        let records = parse_export(&content).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })?;
        debug!("Read {} records", records.len());

        Ok(records)
    }
}

/// Holds records in memory, or a canned failure.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<BatchRecord>,
    failure: Option<String>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new(records: Vec<BatchRecord>) -> Self {
        Self {
            records,
            failure: None,
        }
    }

    /// A source whose scan always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl RecordSource for MemorySource {
    async fn scan_all(&self) -> Result<Vec<BatchRecord>, SourceError> {
        match &self.failure {
            Some(message) => Err(SourceError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message.clone()),
            }),
            None => Ok(self.records.clone()),
        }
    }
}
