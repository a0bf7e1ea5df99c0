//! CSV table I/O for the five input relations and the match table, plus atomic artifact writes.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use anyhow::Context;
use csv::StringRecord;
use rdx_core::{
    normalize_text, Application, DataError, Dataset, Feedback, FilterPolicy, JobDescription,
    MatchResult, Requisition, Resume, INTERVIEW_SCORE_RANGE,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rdx-storage";

pub const APPLICATIONS: &str = "applications";
pub const INTERVIEW_FEEDBACK: &str = "interview_feedback";
pub const REQUISITIONS: &str = "requisitions";
pub const RESUMES: &str = "resumes";
pub const JOB_DESCRIPTIONS: &str = "job_descriptions";
pub const CANDIDATE_MATCHES: &str = "candidate_matches";
pub const HIGHLIGHTS_SIDE_TABLE: &str = "resume_jd_highlights";

/// Separator used when a list of highlight phrases is flattened into one cell.
pub const HIGHLIGHT_SEPARATOR: &str = "; ";

pub const APPLICATION_COLUMNS: [&str; 7] = [
    "applicant_id",
    "job_req_id",
    "application_date",
    "location",
    "job_family",
    "level",
    "hired",
];
pub const FEEDBACK_COLUMNS: [&str; 5] = [
    "applicant_id",
    "job_req_id",
    "interviewer",
    "feedback_text",
    "interview_score",
];
pub const REQUISITION_COLUMNS: [&str; 5] = ["job_req_id", "job_family", "location", "level", "status"];
pub const RESUME_COLUMNS: [&str; 2] = ["applicant_id", "resume_text"];
pub const JOB_DESCRIPTION_COLUMNS: [&str; 3] = ["job_req_id", "job_title", "job_description"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("reading {path}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Data(#[from] DataError),
}

/// File name of an input or output table inside its directory.
pub fn table_file_name(table: &str) -> String {
    format!("{table}.csv")
}

/// Header-validated CSV reader that resolves required columns by name.
struct TableReader {
    table: &'static str,
    path: String,
    reader: csv::Reader<std::fs::File>,
    columns: Vec<usize>,
}

impl TableReader {
    fn open(path: &Path, table: &'static str, required: &[&'static str]) -> Result<Self, StorageError> {
        let path_text = path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .map_err(|source| StorageError::Csv {
                path: path_text.clone(),
                source,
            })?;
        let headers = reader
            .headers()
            .map_err(|source| StorageError::Csv {
                path: path_text.clone(),
                source,
            })?
            .clone();

        let mut columns = Vec::with_capacity(required.len());
        for &column in required {
            let idx = headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == column)
                .ok_or(DataError::MissingColumn { table, column })?;
            columns.push(idx);
        }

        Ok(Self {
            table,
            path: path_text,
            reader,
            columns,
        })
    }

    /// Visit each data row as `(line, values-in-required-order)`.
    fn for_each_row(
        mut self,
        mut visit: impl FnMut(u64, Vec<&str>) -> Result<(), DataError>,
    ) -> Result<(), StorageError> {
        let mut record = StringRecord::new();
        loop {
            let more = self
                .reader
                .read_record(&mut record)
                .map_err(|source| StorageError::Csv {
                    path: self.path.clone(),
                    source,
                })?;
            if !more {
                break;
            }
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let values = self
                .columns
                .iter()
                .map(|&idx| record.get(idx).unwrap_or_default())
                .collect::<Vec<_>>();
            visit(line, values)?;
        }
        debug!(table = self.table, path = %self.path, "table loaded");
        Ok(())
    }
}

fn parse_hired(table: &'static str, line: u64, raw: &str) -> Result<bool, DataError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Ok(true),
        "false" | "0" | "no" | "n" | "f" => Ok(false),
        _ => Err(DataError::InvalidValue {
            table,
            line,
            column: "hired",
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_interview_score(table: &'static str, line: u64, raw: &str) -> Result<u8, DataError> {
    let trimmed = raw.trim();
    // Integral floats ("4.0") show up when a spreadsheet round-trips the column.
    let parsed = trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    });
    let Some(score) = parsed else {
        return Err(DataError::InvalidValue {
            table,
            line,
            column: "interview_score",
            value: raw.to_string(),
            reason: if trimmed.is_empty() {
                "value is missing".to_string()
            } else {
                "expected an integer".to_string()
            },
        });
    };
    let (min, max) = (*INTERVIEW_SCORE_RANGE.start(), *INTERVIEW_SCORE_RANGE.end());
    if score < i64::from(min) || score > i64::from(max) {
        return Err(DataError::ScoreOutOfRange {
            table,
            line,
            score,
            min,
            max,
        });
    }
    Ok(score as u8)
}

fn key(value: &str) -> String {
    value.trim().to_string()
}

/// Natural key of a row, with the label used in duplicate-key errors.
trait TableKey: Eq + Hash {
    fn label(&self) -> String;
}

impl TableKey for String {
    fn label(&self) -> String {
        self.clone()
    }
}

impl TableKey for (String, String) {
    fn label(&self) -> String {
        format!("({}, {})", self.0, self.1)
    }
}

/// Track first-seen lines of keys that must be unique within a table.
struct UniqueKeys<K> {
    table: &'static str,
    seen: HashMap<K, u64>,
}

impl<K: TableKey> UniqueKeys<K> {
    fn new(table: &'static str) -> Self {
        Self {
            table,
            seen: HashMap::new(),
        }
    }

    fn insert(&mut self, key: K, line: u64) -> Result<(), DataError> {
        if let Some(first) = self.seen.get(&key) {
            return Err(DataError::DuplicateKey {
                table: self.table,
                key: key.label(),
                first: *first,
                second: line,
            });
        }
        self.seen.insert(key, line);
        Ok(())
    }
}

pub fn load_applications(path: &Path) -> Result<Vec<Application>, StorageError> {
    let reader = TableReader::open(path, APPLICATIONS, &APPLICATION_COLUMNS)?;
    let mut unique = UniqueKeys::new(APPLICATIONS);
    let mut rows = Vec::new();
    reader.for_each_row(|line, v| {
        let row = Application {
            applicant_id: key(v[0]),
            job_req_id: key(v[1]),
            application_date: v[2].trim().to_string(),
            location: normalize_text(v[3]),
            job_family: normalize_text(v[4]),
            level: normalize_text(v[5]),
            hired: parse_hired(APPLICATIONS, line, v[6])?,
        };
        unique.insert((row.applicant_id.clone(), row.job_req_id.clone()), line)?;
        rows.push(row);
        Ok(())
    })?;
    Ok(rows)
}

pub fn load_feedback(path: &Path) -> Result<Vec<Feedback>, StorageError> {
    let reader = TableReader::open(path, INTERVIEW_FEEDBACK, &FEEDBACK_COLUMNS)?;
    let mut rows = Vec::new();
    reader.for_each_row(|line, v| {
        rows.push(Feedback {
            applicant_id: key(v[0]),
            job_req_id: key(v[1]),
            interviewer: normalize_text(v[2]),
            feedback_text: normalize_text(v[3]),
            interview_score: parse_interview_score(INTERVIEW_FEEDBACK, line, v[4])?,
        });
        Ok(())
    })?;
    Ok(rows)
}

pub fn load_requisitions(path: &Path) -> Result<Vec<Requisition>, StorageError> {
    let reader = TableReader::open(path, REQUISITIONS, &REQUISITION_COLUMNS)?;
    let mut unique = UniqueKeys::new(REQUISITIONS);
    let mut rows = Vec::new();
    reader.for_each_row(|line, v| {
        let row = Requisition {
            job_req_id: key(v[0]),
            job_family: normalize_text(v[1]),
            location: normalize_text(v[2]),
            level: normalize_text(v[3]),
            status: normalize_text(v[4]),
        };
        unique.insert(row.job_req_id.clone(), line)?;
        rows.push(row);
        Ok(())
    })?;
    Ok(rows)
}

pub fn load_resumes(path: &Path) -> Result<Vec<Resume>, StorageError> {
    let reader = TableReader::open(path, RESUMES, &RESUME_COLUMNS)?;
    let mut unique = UniqueKeys::new(RESUMES);
    let mut rows = Vec::new();
    reader.for_each_row(|line, v| {
        let row = Resume {
            applicant_id: key(v[0]),
            resume_text: normalize_text(v[1]),
        };
        unique.insert(row.applicant_id.clone(), line)?;
        rows.push(row);
        Ok(())
    })?;
    Ok(rows)
}

pub fn load_job_descriptions(path: &Path) -> Result<Vec<JobDescription>, StorageError> {
    let reader = TableReader::open(path, JOB_DESCRIPTIONS, &JOB_DESCRIPTION_COLUMNS)?;
    let mut unique = UniqueKeys::new(JOB_DESCRIPTIONS);
    let mut rows = Vec::new();
    reader.for_each_row(|line, v| {
        let row = JobDescription {
            job_req_id: key(v[0]),
            job_title: normalize_text(v[1]),
            job_description: normalize_text(v[2]),
        };
        unique.insert(row.job_req_id.clone(), line)?;
        rows.push(row);
        Ok(())
    })?;
    Ok(rows)
}

/// Load all five input tables from `data_dir`.
pub fn load_dataset(data_dir: &Path) -> anyhow::Result<Dataset> {
    let path_for = |table: &str| data_dir.join(table_file_name(table));
    Ok(Dataset {
        applications: load_applications(&path_for(APPLICATIONS))
            .with_context(|| format!("loading {APPLICATIONS}"))?,
        feedback: load_feedback(&path_for(INTERVIEW_FEEDBACK))
            .with_context(|| format!("loading {INTERVIEW_FEEDBACK}"))?,
        requisitions: load_requisitions(&path_for(REQUISITIONS))
            .with_context(|| format!("loading {REQUISITIONS}"))?,
        resumes: load_resumes(&path_for(RESUMES)).with_context(|| format!("loading {RESUMES}"))?,
        job_descriptions: load_job_descriptions(&path_for(JOB_DESCRIPTIONS))
            .with_context(|| format!("loading {JOB_DESCRIPTIONS}"))?,
    })
}

/// Output columns for a run with the given policy and highlight setting.
pub fn match_table_header(policy: FilterPolicy, highlights: bool) -> Vec<&'static str> {
    let mut header = vec![
        "applicant_id",
        "job_req_id",
        "job_family",
        "location",
        policy.quality_column(),
        "feedback_text",
        "resume_text",
        "matched_to_hired_id",
        "matched_feedback",
        "feedback_similarity",
        "resume_jd_similarity",
        "rediscovery_index_score",
    ];
    if highlights {
        header.push("resume_highlights");
        header.push("jd_match_points");
    }
    header
}

fn join_phrases(phrases: &[String]) -> String {
    phrases
        .iter()
        .map(|p| normalize_text(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(HIGHLIGHT_SEPARATOR)
}

/// Serialize match results as CSV bytes; the header is written even when `results` is empty.
pub fn encode_match_table(
    results: &[MatchResult],
    policy: FilterPolicy,
    highlights: bool,
) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(match_table_header(policy, highlights))
        .context("writing candidate_matches header")?;

    for result in results {
        let mut record = vec![
            normalize_text(&result.applicant_id),
            normalize_text(&result.job_req_id),
            normalize_text(&result.job_family),
            normalize_text(&result.location),
            result.quality.to_string(),
            normalize_text(&result.feedback_text),
            normalize_text(&result.resume_text),
            normalize_text(&result.matched_to_hired_id),
            normalize_text(&result.matched_feedback),
            result.feedback_similarity.to_string(),
            result.resume_jd_similarity.to_string(),
            result.rediscovery_index_score.to_string(),
        ];
        if highlights {
            let (resume, jd) = result
                .highlights
                .as_ref()
                .map(|h| (join_phrases(&h.resume_highlights), join_phrases(&h.jd_match_points)))
                .unwrap_or_default();
            record.push(resume);
            record.push(jd);
        }
        writer
            .write_record(&record)
            .with_context(|| format!("writing match row for {}", result.applicant_id))?;
    }

    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flushing candidate_matches table: {}", err.error()))
}

/// A row of `candidate_matches.csv` as read back by the presentation layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchTableRow {
    pub applicant_id: String,
    pub job_req_id: String,
    pub job_family: String,
    pub location: String,
    #[serde(default)]
    pub interview_score: Option<u8>,
    #[serde(default)]
    pub feedback_sentiment: Option<f64>,
    pub feedback_text: String,
    pub resume_text: String,
    pub matched_to_hired_id: String,
    pub matched_feedback: String,
    pub feedback_similarity: f64,
    pub resume_jd_similarity: f64,
    pub rediscovery_index_score: f64,
    #[serde(default)]
    pub resume_highlights: Option<String>,
    #[serde(default)]
    pub jd_match_points: Option<String>,
}

impl MatchTableRow {
    /// Cell text for a named column; unknown columns render empty.
    pub fn field(&self, column: &str) -> String {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        match column {
            "applicant_id" => self.applicant_id.clone(),
            "job_req_id" => self.job_req_id.clone(),
            "job_family" => self.job_family.clone(),
            "location" => self.location.clone(),
            "interview_score" => self.interview_score.map(|s| s.to_string()).unwrap_or_default(),
            "feedback_sentiment" => self
                .feedback_sentiment
                .map(|s| s.to_string())
                .unwrap_or_default(),
            "feedback_text" => self.feedback_text.clone(),
            "resume_text" => self.resume_text.clone(),
            "matched_to_hired_id" => self.matched_to_hired_id.clone(),
            "matched_feedback" => self.matched_feedback.clone(),
            "feedback_similarity" => self.feedback_similarity.to_string(),
            "resume_jd_similarity" => self.resume_jd_similarity.to_string(),
            "rediscovery_index_score" => self.rediscovery_index_score.to_string(),
            "resume_highlights" => opt(&self.resume_highlights),
            "jd_match_points" => opt(&self.jd_match_points),
            _ => String::new(),
        }
    }
}

/// Parsed match table with its original column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchTable {
    pub header: Vec<String>,
    pub rows: Vec<MatchTableRow>,
}

impl MatchTable {
    pub fn has_column(&self, column: &str) -> bool {
        self.header.iter().any(|h| h == column)
    }
}

pub fn read_match_table(path: &Path) -> anyhow::Result<MatchTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let header = reader
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    let rows = reader
        .deserialize::<MatchTableRow>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(MatchTable { header, rows })
}

/// Serialize a (possibly filtered) match table back to CSV using its header.
pub fn encode_table_rows(header: &[String], rows: &[MatchTableRow]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header).context("writing header")?;
    for row in rows {
        writer
            .write_record(header.iter().map(|column| row.field(column)))
            .with_context(|| format!("writing row for {}", row.applicant_id))?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flushing exported table: {}", err.error()))
}

/// A row of the externally produced highlights side-table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRow {
    pub applicant_id: String,
    pub job_req_id: String,
    #[serde(default)]
    pub resume_highlights: String,
    #[serde(default)]
    pub jd_match_points: String,
}

pub fn read_highlights_side_table(path: &Path) -> anyhow::Result<Vec<HighlightRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    reader
        .deserialize::<HighlightRow>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    /// The target already held identical bytes, so nothing was rewritten.
    pub unchanged: bool,
}

/// Directory-rooted sink that replaces files atomically.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Write `bytes` to `relative_path` under the root via temp file + rename,
    /// creating parent directories first.
    pub async fn write_atomic(
        &self,
        relative_path: impl AsRef<Path>,
        bytes: &[u8],
    ) -> anyhow::Result<StoredArtifact> {
        let relative_path = relative_path.as_ref().to_path_buf();
        let absolute_path = self.root.join(&relative_path);
        let span = info_span!("artifact_write", path = %absolute_path.display(), bytes = bytes.len());
        self.replace_file(relative_path, absolute_path, bytes)
            .instrument(span)
            .await
    }

    async fn replace_file(
        &self,
        relative_path: PathBuf,
        absolute_path: PathBuf,
        bytes: &[u8],
    ) -> anyhow::Result<StoredArtifact> {
        let content_hash = Self::sha256_hex(bytes);
        let parent = absolute_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating artifact directory {}", parent.display()))?;

        if fs::try_exists(&absolute_path)
            .await
            .with_context(|| format!("checking artifact path {}", absolute_path.display()))?
        {
            let existing = fs::read(&absolute_path)
                .await
                .with_context(|| format!("reading existing artifact {}", absolute_path.display()))?;
            if Self::sha256_hex(&existing) == content_hash {
                return Ok(StoredArtifact {
                    content_hash,
                    relative_path,
                    absolute_path,
                    byte_size: bytes.len(),
                    unchanged: true,
                });
            }
        }

        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp artifact file {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing temp artifact file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp artifact file {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &absolute_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "atomically renaming temp artifact {} -> {}",
                    temp_path.display(),
                    absolute_path.display()
                )
            });
        }

        Ok(StoredArtifact {
            content_hash,
            relative_path,
            absolute_path,
            byte_size: bytes.len(),
            unchanged: false,
        })
    }
}
