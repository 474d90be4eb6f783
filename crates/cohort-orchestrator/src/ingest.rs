//! File ingestion gateways.
//!
//! A gateway turns a path and file type into an ordered list of raw rows.
//! Every gateway remembers the content hashes it has handed out and rejects
//! a file whose exact bytes were ingested before.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use cohort_types::{ContentHash, RawRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Supported input formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Parquet,
    Json,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            _ => Err(PipelineError::UnsupportedType(s.to_string())),
        }
    }
}

/// Raw rows of one file, in file order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestedFile {
    pub filename: String,
    pub content_hash: ContentHash,
    pub records: Vec<RawRecord>,
}

#[async_trait]
pub trait IngestionGateway: Send + Sync {
    /// Read a file into raw rows.
    ///
    /// Fails with `NotFound` for a missing file, `UnsupportedType` for a
    /// format the gateway cannot parse and `Conflict` for content already
    /// ingested.
    async fn ingest(&self, path: &str, file_type: FileType) -> PipelineResult<IngestedFile>;
}

/// Content hashes a gateway has already handed out.
#[derive(Debug, Default)]
struct SeenContent(Mutex<HashSet<ContentHash>>);

impl SeenContent {
    fn claim(&self, hash: ContentHash, filename: &str) -> PipelineResult<()> {
        let mut seen = self
            .0
            .lock()
            .map_err(|_| PipelineError::Conflict("content index unavailable".into()))?;
        if !seen.insert(hash) {
            return Err(PipelineError::Conflict(format!(
                "{filename} has already been loaded (content {})",
                hash.short_hex()
            )));
        }
        Ok(())
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

// ---------------------------------------------------------------------------
// InMemoryGateway
// ---------------------------------------------------------------------------

/// Gateway over fixtures registered in memory. Content is hashed from the
/// rows' JSON encoding.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    files: RwLock<HashMap<String, (FileType, Vec<RawRecord>)>>,
    seen: SeenContent,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the rows served for `path`.
    pub fn register(
        &self,
        path: impl Into<String>,
        file_type: FileType,
        records: Vec<RawRecord>,
    ) -> PipelineResult<()> {
        let mut files = self
            .files
            .write()
            .map_err(|_| PipelineError::InvalidInput("fixture table unavailable".into()))?;
        files.insert(path.into(), (file_type, records));
        Ok(())
    }
}

#[async_trait]
impl IngestionGateway for InMemoryGateway {
    async fn ingest(&self, path: &str, file_type: FileType) -> PipelineResult<IngestedFile> {
        let (registered, records) = {
            let files = self
                .files
                .read()
                .map_err(|_| PipelineError::InvalidInput("fixture table unavailable".into()))?;
            files
                .get(path)
                .cloned()
                .ok_or_else(|| PipelineError::NotFound(format!("File not found: {path}")))?
        };
        if registered != file_type {
            return Err(PipelineError::InvalidInput(format!(
                "{path} is a {registered} file, not {file_type}"
            )));
        }
        let bytes =
            serde_json::to_vec(&records).map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
        let filename = file_name(path);
        let content_hash = ContentHash::of(&bytes);
        self.seen.claim(content_hash, &filename)?;
        Ok(IngestedFile {
            filename,
            content_hash,
            records,
        })
    }
}

// ---------------------------------------------------------------------------
// JsonFileGateway
// ---------------------------------------------------------------------------

/// Reads files holding a JSON array of flat objects.
///
/// CSV and Parquet parsing belong to an external collaborator; this gateway
/// reports them as unsupported.
#[derive(Debug, Default)]
pub struct JsonFileGateway {
    seen: SeenContent,
}

impl JsonFileGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IngestionGateway for JsonFileGateway {
    async fn ingest(&self, path: &str, file_type: FileType) -> PipelineResult<IngestedFile> {
        if file_type != FileType::Json {
            return Err(PipelineError::UnsupportedType(format!(
                "{file_type} (only json is read by this gateway)"
            )));
        }
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::NotFound(format!("File not found: {path}")));
            }
            Err(err) => return Err(err.into()),
        };
        let records: Vec<RawRecord> = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::InvalidInput(format!("{path}: {e}")))?;

        let filename = file_name(path);
        let content_hash = ContentHash::of(&bytes);
        self.seen.claim(content_hash, &filename)?;
        debug!(%filename, records = records.len(), hash = %content_hash.short_hex(), "file ingested");
        Ok(IngestedFile {
            filename,
            content_hash,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use cohort_types::FieldValue;

    use super::*;

    fn row(key: i64) -> RawRecord {
        let mut r = RawRecord::new();
        r.insert("nhs_number".into(), FieldValue::Int(key));
        r.insert("given_name".into(), FieldValue::text("Ann"));
        r
    }

    #[test]
    fn file_type_parses_case_insensitively() {
        assert_eq!("CSV".parse::<FileType>().unwrap(), FileType::Csv);
        assert_eq!(" json ".parse::<FileType>().unwrap(), FileType::Json);
        assert!(matches!(
            "xlsx".parse::<FileType>(),
            Err(PipelineError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_gateway_serves_and_deduplicates() {
        let gateway = InMemoryGateway::new();
        gateway
            .register("/data/cohort_1.json", FileType::Json, vec![row(1), row(2)])
            .unwrap();
        gateway
            .register("/data/copy.json", FileType::Json, vec![row(1), row(2)])
            .unwrap();

        let file = gateway.ingest("/data/cohort_1.json", FileType::Json).await.unwrap();
        assert_eq!(file.filename, "cohort_1.json");
        assert_eq!(file.records.len(), 2);

        let again = gateway.ingest("/data/copy.json", FileType::Json).await;
        assert!(matches!(again, Err(PipelineError::Conflict(_))));
        assert!(matches!(
            gateway.ingest("/data/missing.json", FileType::Json).await,
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            gateway.ingest("/data/cohort_1.json", FileType::Csv).await,
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn json_gateway_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.json");
        std::fs::write(
            &path,
            r#"[{"nhs_number": 9434765919, "given_name": "Ann", "eligibility": true, "postcode": null}]"#,
        )
        .unwrap();
        let path = path.to_string_lossy().into_owned();

        let gateway = JsonFileGateway::new();
        let file = gateway.ingest(&path, FileType::Json).await.unwrap();
        assert_eq!(file.records.len(), 1);
        assert_eq!(file.records[0]["eligibility"], FieldValue::Bool(true));
        assert_eq!(file.records[0]["postcode"], FieldValue::Null);

        assert!(matches!(
            gateway.ingest(&path, FileType::Json).await,
            Err(PipelineError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn json_gateway_rejects_other_types_and_bad_content() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = JsonFileGateway::new();
        let missing = dir.path().join("none.json").to_string_lossy().into_owned();
        assert!(matches!(
            gateway.ingest(&missing, FileType::Json).await,
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            gateway.ingest(&missing, FileType::Parquet).await,
            Err(PipelineError::UnsupportedType(_))
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        let bad = bad.to_string_lossy().into_owned();
        assert!(matches!(
            gateway.ingest(&bad, FileType::Json).await,
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
