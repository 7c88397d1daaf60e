//! Catalog sources: where snapshot records come from.

use crate::{AclDocument, CatalogRecords, Error, Result, Violation, ViolationKind};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Supplies every record of the catalog in one fetch.
///
/// Implementations must return a consistent view: the records of a single
/// call are treated as one atomic snapshot.
pub trait CatalogSource {
    fn load_all(&self) -> Result<CatalogRecords>;
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: CatalogRecords,
}

impl MemorySource {
    pub fn new(records: CatalogRecords) -> Self {
        Self { records }
    }

    pub fn from_documents(documents: impl IntoIterator<Item = AclDocument>) -> Self {
        Self::new(CatalogRecords::from_documents(documents))
    }
}

impl CatalogSource for MemorySource {
    fn load_all(&self) -> Result<CatalogRecords> {
        Ok(self.records.clone())
    }
}

/// A JSON file holding an array of `acl` documents.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonFileSource {
    fn load_all(&self) -> Result<CatalogRecords> {
        let content = std::fs::read_to_string(&self.path)?;
        let documents = parse_documents(&content)?;
        tracing::debug!(
            path = %self.path.display(),
            documents = documents.len(),
            "Read catalog file"
        );
        Ok(CatalogRecords::from_documents(documents))
    }
}

/// Parse a JSON array of `acl` documents.
///
/// Every unreadable document is reported, not just the first one; the
/// returned error is [`Error::Rejected`] in that case, and also carries the
/// validation violations of the documents that did parse.
pub fn parse_documents(json: &str) -> Result<Vec<AclDocument>> {
    let values: Vec<Value> = serde_json::from_str(json).map_err(|e| Error::Parse(e.to_string()))?;
    documents_from_values(values)
}

/// Convert already parsed JSON values into `acl` documents.
///
/// If any value is not a document, the load is rejected with every
/// malformed value followed by the violations of the readable ones.
pub fn documents_from_values(values: Vec<Value>) -> Result<Vec<AclDocument>> {
    let mut documents = Vec::with_capacity(values.len());
    let mut violations = Vec::new();

    for (index, value) in values.into_iter().enumerate() {
        let record = value
            .get("_id")
            .or_else(|| value.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{index}"));

        match serde_json::from_value::<AclDocument>(value) {
            Ok(document) => documents.push(document),
            Err(e) => violations.push(Violation::new(
                record,
                None,
                ViolationKind::Malformed {
                    reason: e.to_string(),
                },
            )),
        }
    }

    if violations.is_empty() {
        return Ok(documents);
    }
    violations.extend(CatalogRecords::from_documents(documents).validate());
    Err(Error::Rejected(violations))
}
