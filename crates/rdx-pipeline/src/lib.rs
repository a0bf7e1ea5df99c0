//! Rediscovery pipeline: merge, quality filter, peer selection, similarity and scoring,
//! followed by the result sink and per-run reports.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use arrow_array::{Float64Array, RecordBatch, StringArray, UInt32Array};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use rdx_core::{
    round3, DataError, Dataset, FilterPolicy, Highlights, MatchResult, MergedRecord,
    QualitySignal, MIN_INTERVIEW_SCORE, SENTIMENT_THRESHOLD, SIMILARITY_THRESHOLD,
};
use rdx_signals::{
    cosine_similarity, embedder_for_name, EmbedError, Embedder, SentimentAnalyzer, Signals,
    DEFAULT_EMBEDDER, DEFAULT_EMBEDDING_DIM,
};
use rdx_storage::{
    encode_match_table, load_dataset, table_file_name, ArtifactStore, CANDIDATE_MATCHES,
    HIGHLIGHT_SEPARATOR,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rdx-pipeline";

pub const DEFAULT_HIGHLIGHT_TOP_N: usize = 5;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub workspace_root: PathBuf,
    pub policy: FilterPolicy,
    pub embedder: String,
    pub embedding_dim: usize,
    pub highlights: bool,
    pub highlight_top_n: usize,
    pub strict_references: bool,
    pub write_reports: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            output_dir: PathBuf::from("./outputs"),
            workspace_root: PathBuf::from("."),
            policy: FilterPolicy::default(),
            embedder: DEFAULT_EMBEDDER.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            highlights: false,
            highlight_top_n: DEFAULT_HIGHLIGHT_TOP_N,
            strict_references: false,
            write_reports: true,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True" | "yes"))
        .unwrap_or(default)
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let policy = match std::env::var("RDX_FILTER_POLICY") {
            Ok(raw) => raw.parse::<FilterPolicy>().map_err(|err| anyhow!("RDX_FILTER_POLICY: {err}"))?,
            Err(_) => defaults.policy,
        };
        Ok(Self {
            data_dir: std::env::var("RDX_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            output_dir: std::env::var("RDX_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            workspace_root: std::env::var("RDX_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_root),
            policy,
            embedder: std::env::var("RDX_EMBEDDER").unwrap_or(defaults.embedder),
            embedding_dim: std::env::var("RDX_EMBEDDING_DIM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.embedding_dim),
            highlights: env_flag("RDX_HIGHLIGHTS", false),
            highlight_top_n: std::env::var("RDX_HIGHLIGHT_TOP_N")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.highlight_top_n),
            strict_references: env_flag("RDX_STRICT_REFERENCES", false),
            write_reports: env_flag("RDX_WRITE_REPORTS", true),
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(table_file_name(CANDIDATE_MATCHES))
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            policy: self.policy,
            highlights: self.highlights,
            highlight_top_n: self.highlight_top_n,
            strict_references: self.strict_references,
        }
    }
}

/// The matching knobs, independent of where inputs and outputs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchConfig {
    pub policy: FilterPolicy,
    pub highlights: bool,
    pub highlight_top_n: usize,
    pub strict_references: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        PipelineConfig::default().match_config()
    }
}

/// Per-stage counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub applications: usize,
    pub feedback_rows: usize,
    pub merged_rows: usize,
    pub orphan_feedback: usize,
    pub unjoined_applications: usize,
    pub hired: usize,
    pub not_hired: usize,
    pub filtered_out: usize,
    pub evaluated: usize,
    pub skipped_no_peers: usize,
    pub embedding_failures: usize,
    #[serde(default)]
    pub failed_texts: usize,
    pub non_qualifying: usize,
    pub matches: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub records: Vec<MergedRecord>,
    pub orphan_feedback: usize,
    pub unjoined_applications: usize,
}

/// Inner-join the five relations into one row per (applicant, requisition, feedback).
///
/// Rows follow application order, then feedback order within a pair. Feedback
/// without an application is counted, or rejected when `strict_references` is set.
pub fn merge_records(dataset: &Dataset, strict_references: bool) -> Result<MergeOutcome, DataError> {
    let application_keys = dataset
        .applications
        .iter()
        .map(|a| (a.applicant_id.as_str(), a.job_req_id.as_str()))
        .collect::<HashSet<_>>();

    let mut feedback_by_key: HashMap<(&str, &str), Vec<&rdx_core::Feedback>> = HashMap::new();
    let mut orphans = Vec::new();
    for feedback in &dataset.feedback {
        let key = (feedback.applicant_id.as_str(), feedback.job_req_id.as_str());
        if application_keys.contains(&key) {
            feedback_by_key.entry(key).or_default().push(feedback);
        } else {
            orphans.push(key);
        }
    }

    if let Some((applicant_id, job_req_id)) = orphans.first() {
        if strict_references {
            return Err(DataError::OrphanFeedback {
                count: orphans.len(),
                applicant_id: applicant_id.to_string(),
                job_req_id: job_req_id.to_string(),
            });
        }
        warn!(
            count = orphans.len(),
            applicant_id = %applicant_id,
            job_req_id = %job_req_id,
            "feedback rows reference no application; dropped by join"
        );
    }

    let requisitions = dataset
        .requisitions
        .iter()
        .map(|r| (r.job_req_id.as_str(), r))
        .collect::<HashMap<_, _>>();
    let resumes = dataset
        .resumes
        .iter()
        .map(|r| (r.applicant_id.as_str(), r))
        .collect::<HashMap<_, _>>();
    let descriptions = dataset
        .job_descriptions
        .iter()
        .map(|d| (d.job_req_id.as_str(), d))
        .collect::<HashMap<_, _>>();

    let mut records = Vec::new();
    let mut unjoined_applications = 0usize;
    for app in &dataset.applications {
        let key = (app.applicant_id.as_str(), app.job_req_id.as_str());
        let joined = (
            feedback_by_key.get(&key),
            requisitions.get(app.job_req_id.as_str()),
            resumes.get(app.applicant_id.as_str()),
            descriptions.get(app.job_req_id.as_str()),
        );
        let (Some(feedback_rows), Some(req), Some(resume), Some(jd)) = joined else {
            debug!(applicant_id = %app.applicant_id, job_req_id = %app.job_req_id, "application has no complete join");
            unjoined_applications += 1;
            continue;
        };
        for feedback in feedback_rows {
            records.push(MergedRecord {
                applicant_id: app.applicant_id.clone(),
                job_req_id: app.job_req_id.clone(),
                application_date: app.application_date.clone(),
                location: app.location.clone(),
                job_family: app.job_family.clone(),
                level: app.level.clone(),
                hired: app.hired,
                interviewer: feedback.interviewer.clone(),
                feedback_text: feedback.feedback_text.clone(),
                interview_score: feedback.interview_score,
                job_family_req: req.job_family.clone(),
                location_req: req.location.clone(),
                level_req: req.level.clone(),
                status: req.status.clone(),
                resume_text: resume.resume_text.clone(),
                job_title: jd.job_title.clone(),
                job_description: jd.job_description.clone(),
            });
        }
    }

    Ok(MergeOutcome {
        records,
        orphan_feedback: orphans.len(),
        unjoined_applications,
    })
}

/// A merged row with the quality value it was filtered on.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: MergedRecord,
    pub quality: QualitySignal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub hired: Vec<ScoredRecord>,
    pub not_hired: Vec<ScoredRecord>,
    pub filtered_out: usize,
}

/// Apply the quality policy and split by `hired`, preserving input order.
pub fn partition(
    records: Vec<MergedRecord>,
    policy: FilterPolicy,
    sentiment: &dyn SentimentAnalyzer,
) -> Result<Partition, DataError> {
    let mut out = Partition::default();
    for record in records {
        let (quality, keep) = match policy {
            FilterPolicy::ScoreThreshold => (
                QualitySignal::InterviewScore(record.interview_score),
                record.interview_score >= MIN_INTERVIEW_SCORE,
            ),
            FilterPolicy::SentimentThreshold => {
                let polarity = sentiment.polarity(&record.feedback_text);
                if !polarity.is_finite() {
                    return Err(DataError::UnusableSignal {
                        signal: "feedback_sentiment",
                        applicant_id: record.applicant_id,
                        job_req_id: record.job_req_id,
                        value: polarity.to_string(),
                    });
                }
                (
                    QualitySignal::Sentiment(polarity),
                    record.hired || polarity > SENTIMENT_THRESHOLD,
                )
            }
        };

        if !keep {
            out.filtered_out += 1;
            continue;
        }
        let scored = ScoredRecord { record, quality };
        if scored.record.hired {
            out.hired.push(scored);
        } else {
            out.not_hired.push(scored);
        }
    }
    Ok(out)
}

/// Hired rows sharing the candidate's job family and location (exact match).
pub fn select_peers<'a>(candidate: &MergedRecord, hired: &'a [ScoredRecord]) -> Vec<&'a ScoredRecord> {
    hired
        .iter()
        .filter(|peer| {
            peer.record.job_family == candidate.job_family && peer.record.location == candidate.location
        })
        .collect()
}

/// Cosine similarity over one embedder, memoizing vectors and failures by text for the run.
pub struct SimilarityEngine<'e> {
    embedder: &'e dyn Embedder,
    memo: HashMap<String, Vec<f32>>,
    failures: HashMap<String, String>,
}

impl<'e> SimilarityEngine<'e> {
    pub fn new(embedder: &'e dyn Embedder) -> Self {
        Self {
            embedder,
            memo: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    /// Embed `text` once; a failure is logged on first sight and replayed afterwards.
    fn ensure(&mut self, text: &str) -> Result<(), EmbedError> {
        if self.memo.contains_key(text) {
            return Ok(());
        }
        if let Some(reason) = self.failures.get(text) {
            return Err(EmbedError::Inference {
                reason: reason.clone(),
            });
        }
        match self.embedder.embed(text) {
            Ok(vector) => {
                self.memo.insert(text.to_string(), vector);
                Ok(())
            }
            Err(err) => {
                warn!(chars = text.len(), error = %err, "text could not be embedded");
                self.failures.insert(text.to_string(), err.to_string());
                Err(err)
            }
        }
    }

    /// Blank text on either side scores 0 and never reaches the embedder.
    pub fn similarity(&mut self, a: &str, b: &str) -> Result<f64, EmbedError> {
        if a.trim().is_empty() || b.trim().is_empty() {
            return Ok(0.0);
        }
        self.ensure(a)?;
        self.ensure(b)?;
        Ok(cosine_similarity(&self.memo[a], &self.memo[b]))
    }

    /// Index and score of the most similar candidate text; the first maximum wins.
    ///
    /// Fails only when `text` itself cannot be embedded. Candidates that cannot be
    /// embedded are left out of the comparison.
    pub fn best_match(&mut self, text: &str, candidates: &[&str]) -> Result<Option<(usize, f64)>, EmbedError> {
        if !text.trim().is_empty() {
            self.ensure(text)?;
        }
        let mut best: Option<(usize, f64)> = None;
        for (idx, other) in candidates.iter().enumerate() {
            let score = match self.similarity(text, other) {
                Ok(score) => score,
                Err(_) => continue,
            };
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((idx, score));
            }
        }
        Ok(best)
    }

    pub fn cached_vectors(&self) -> usize {
        self.memo.len()
    }

    /// Distinct texts the embedder rejected this run.
    pub fn failed_texts(&self) -> usize {
        self.failures.len()
    }
}

pub fn qualifies(feedback_similarity: f64, resume_jd_similarity: f64) -> bool {
    feedback_similarity >= SIMILARITY_THRESHOLD || resume_jd_similarity >= SIMILARITY_THRESHOLD
}

pub fn rediscovery_index(feedback_similarity: f64, resume_jd_similarity: f64) -> f64 {
    round3((feedback_similarity + resume_jd_similarity) / 2.0)
}

/// Best peer (index, feedback similarity) and the resume-to-JD similarity.
fn score_candidate(
    engine: &mut SimilarityEngine<'_>,
    record: &MergedRecord,
    peer_feedback: &[&str],
) -> Result<Option<((usize, f64), f64)>, EmbedError> {
    let Some(best) = engine.best_match(&record.feedback_text, peer_feedback)? else {
        return Ok(None);
    };
    let resume_jd = engine.similarity(&record.resume_text, &record.job_description)?;
    Ok(Some((best, resume_jd)))
}

#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub results: Vec<MatchResult>,
    pub counts: RunCounts,
}

/// Run merge through assembly over an in-memory dataset.
pub fn match_candidates(dataset: &Dataset, signals: &Signals, config: &MatchConfig) -> Result<MatchOutcome, DataError> {
    let mut counts = RunCounts {
        applications: dataset.applications.len(),
        feedback_rows: dataset.feedback.len(),
        ..RunCounts::default()
    };

    let merged = merge_records(dataset, config.strict_references)?;
    counts.merged_rows = merged.records.len();
    counts.orphan_feedback = merged.orphan_feedback;
    counts.unjoined_applications = merged.unjoined_applications;

    let partition = partition(merged.records, config.policy, signals.sentiment.as_ref())?;
    counts.hired = partition.hired.len();
    counts.not_hired = partition.not_hired.len();
    counts.filtered_out = partition.filtered_out;

    let mut engine = SimilarityEngine::new(signals.embedder.as_ref());
    let mut results = Vec::new();
    for candidate in &partition.not_hired {
        let record = &candidate.record;
        let peers = select_peers(record, &partition.hired);
        if peers.is_empty() {
            debug!(applicant_id = %record.applicant_id, job_family = %record.job_family, location = %record.location, "no hired peers");
            counts.skipped_no_peers += 1;
            continue;
        }
        counts.evaluated += 1;

        let peer_feedback = peers.iter().map(|p| p.record.feedback_text.as_str()).collect::<Vec<_>>();
        let (best, resume_jd_similarity) = match score_candidate(&mut engine, record, &peer_feedback) {
            Ok(Some(scored)) => scored,
            Ok(None) => {
                debug!(applicant_id = %record.applicant_id, "no hired peer could be embedded");
                counts.skipped_no_peers += 1;
                continue;
            }
            Err(err) => {
                warn!(applicant_id = %record.applicant_id, job_req_id = %record.job_req_id, error = %err, "embedding failed; candidate excluded");
                counts.embedding_failures += 1;
                continue;
            }
        };
        let (peer_idx, feedback_similarity) = best;

        if !qualifies(feedback_similarity, resume_jd_similarity) {
            counts.non_qualifying += 1;
            continue;
        }

        let peer = peers[peer_idx];
        let highlights = config.highlights.then(|| Highlights {
            resume_highlights: signals.keywords.extract(&record.resume_text, config.highlight_top_n),
            jd_match_points: signals.keywords.extract(&record.job_description, config.highlight_top_n),
        });
        results.push(MatchResult {
            applicant_id: record.applicant_id.clone(),
            job_req_id: record.job_req_id.clone(),
            job_family: record.job_family.clone(),
            location: record.location.clone(),
            quality: candidate.quality,
            feedback_text: record.feedback_text.clone(),
            resume_text: record.resume_text.clone(),
            matched_to_hired_id: peer.record.applicant_id.clone(),
            matched_feedback: peer.record.feedback_text.clone(),
            feedback_similarity,
            resume_jd_similarity,
            rediscovery_index_score: rediscovery_index(feedback_similarity, resume_jd_similarity),
            highlights,
        });
    }

    counts.matches = results.len();
    counts.failed_texts = engine.failed_texts();
    debug!(cached_vectors = engine.cached_vectors(), "similarity memo size");
    Ok(MatchOutcome { results, counts })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub policy: FilterPolicy,
    pub embedder: String,
    pub highlights: bool,
    pub counts: RunCounts,
    pub output_path: String,
    pub output_sha256: String,
    pub output_unchanged: bool,
    #[serde(default)]
    pub reports_dir: Option<String>,
    #[serde(default)]
    pub parquet_manifest: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetManifest {
    pub schema_version: u32,
    pub files: Vec<ParquetManifestFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

pub struct RediscoveryPipeline {
    config: PipelineConfig,
    outputs: ArtifactStore,
    workspace: ArtifactStore,
    signals: Signals,
}

impl RediscoveryPipeline {
    pub fn new(config: PipelineConfig, signals: Signals) -> Self {
        Self {
            outputs: ArtifactStore::new(config.output_dir.clone()),
            workspace: ArtifactStore::new(config.workspace_root.clone()),
            config,
            signals,
        }
    }

    /// Build signals from the configured embedder name and the workspace rule files.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let embedder = embedder_for_name(&config.embedder, config.embedding_dim)
            .with_context(|| format!("building embedder {:?}", config.embedder))?;
        let signals = Signals::from_workspace_root(&config.workspace_root, embedder)?;
        Ok(Self::new(config, signals))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run_once(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("rediscovery_run", %run_id, policy = %self.config.policy);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunSummary> {
        let started_at = Utc::now();
        let dataset = load_dataset(&self.config.data_dir)?;
        info!(
            applications = dataset.applications.len(),
            feedback = dataset.feedback.len(),
            data_dir = %self.config.data_dir.display(),
            "inputs loaded"
        );

        let match_config = self.config.match_config();
        let outcome = match_candidates(&dataset, &self.signals, &match_config)?;

        let bytes = encode_match_table(&outcome.results, match_config.policy, match_config.highlights)?;
        let stored = self
            .outputs
            .write_atomic(table_file_name(CANDIDATE_MATCHES), &bytes)
            .await
            .with_context(|| format!("saving {}", self.config.output_path().display()))?;

        let mut summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            policy: match_config.policy,
            embedder: self.signals.embedder.name().to_string(),
            highlights: match_config.highlights,
            counts: outcome.counts,
            output_path: stored.absolute_path.display().to_string(),
            output_sha256: stored.content_hash.clone(),
            output_unchanged: stored.unchanged,
            reports_dir: None,
            parquet_manifest: None,
        };

        if self.config.write_reports {
            let reports_dir = PathBuf::from("reports").join(run_id.to_string());
            let manifest = self.export_parquet_snapshot(&reports_dir, &outcome.results).await?;
            summary.reports_dir = Some(self.workspace.root().join(&reports_dir).display().to_string());
            summary.parquet_manifest = Some(manifest.display().to_string());
            self.write_reports(&reports_dir, &summary, &outcome.results).await?;
        }

        if summary.counts.matches == 0 {
            info!(output = %summary.output_path, "no rediscovery matches found");
        } else {
            info!(matches = summary.counts.matches, output = %summary.output_path, "rediscovery matches saved");
        }
        Ok(summary)
    }

    async fn write_reports(&self, reports_dir: &Path, summary: &RunSummary, results: &[MatchResult]) -> Result<()> {
        let summary_json = serde_json::to_vec_pretty(summary).context("serializing run summary")?;
        self.workspace
            .write_atomic(reports_dir.join("run_summary.json"), &summary_json)
            .await
            .context("writing run_summary.json")?;

        let brief = render_brief(summary, results);
        self.workspace
            .write_atomic(reports_dir.join("brief.md"), brief.as_bytes())
            .await
            .context("writing brief.md")?;
        Ok(())
    }

    async fn export_parquet_snapshot(&self, reports_dir: &Path, results: &[MatchResult]) -> Result<PathBuf> {
        let absolute_reports_dir = self.workspace.root().join(reports_dir);
        let snapshot_dir = absolute_reports_dir.join("snapshots");
        tokio::fs::create_dir_all(&snapshot_dir)
            .await
            .with_context(|| format!("creating {}", snapshot_dir.display()))?;

        let matches_path = snapshot_dir.join("candidate_matches.parquet");
        write_matches_parquet(&matches_path, results)?;

        let manifest = ParquetManifest {
            schema_version: 1,
            files: vec![manifest_entry(CANDIDATE_MATCHES, &absolute_reports_dir, &matches_path)?],
        };
        let bytes = serde_json::to_vec_pretty(&manifest).context("serializing parquet manifest")?;
        let stored = self
            .workspace
            .write_atomic(reports_dir.join("snapshots").join("manifest.json"), &bytes)
            .await
            .context("writing parquet manifest")?;
        Ok(stored.absolute_path)
    }
}

pub async fn run_rediscovery_from_env() -> Result<RunSummary> {
    let pipeline = RediscoveryPipeline::from_config(PipelineConfig::from_env()?)?;
    pipeline.run_once().await
}

fn render_brief(summary: &RunSummary, results: &[MatchResult]) -> String {
    let mut family_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for result in results {
        *family_counts.entry(result.job_family.as_str()).or_default() += 1;
    }
    let c = &summary.counts;
    let families = if family_counts.is_empty() {
        "No rediscovery matches in this run.".to_string()
    } else {
        family_counts
            .iter()
            .map(|(family, n)| format!("- {family}: {n}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "# Rediscovery Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Policy: {}\n- Embedder: {}\n- Matches: {}\n\n## Funnel\n- applications: {}\n- merged rows: {}\n- orphan feedback: {}\n- hired / not hired: {} / {}\n- filtered out: {}\n- skipped (no peers): {}\n- embedding failures: {} ({} text(s) not embedded)\n- below threshold: {}\n\n## Matches by Job Family\n{}\n",
        summary.run_id,
        summary.started_at,
        summary.finished_at,
        summary.policy,
        summary.embedder,
        c.matches,
        c.applications,
        c.merged_rows,
        c.orphan_feedback,
        c.hired,
        c.not_hired,
        c.filtered_out,
        c.skipped_no_peers,
        c.embedding_failures,
        c.failed_texts,
        c.non_qualifying,
        families
    )
}

/// Run summaries under `<root>/reports`, newest first.
pub fn recent_runs(workspace_root: &Path, limit: usize) -> Result<Vec<RunSummary>> {
    let reports_root = workspace_root.join("reports");
    if !reports_root.exists() {
        return Ok(Vec::new());
    }
    let mut runs = Vec::new();
    for entry in std::fs::read_dir(&reports_root)
        .with_context(|| format!("reading {}", reports_root.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
    {
        let path = entry.path().join("run_summary.json");
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<RunSummary>(&text) {
            Ok(summary) => runs.push(summary),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable run summary"),
        }
    }
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs.truncate(limit.max(1));
    Ok(runs)
}

pub fn report_digest_markdown(runs: usize, workspace_root: Option<PathBuf>) -> Result<String> {
    let root = workspace_root.unwrap_or_else(|| PathBuf::from("."));
    let summaries = recent_runs(&root, runs)?;

    let mut lines = vec!["# Rediscovery Runs".to_string(), String::new()];
    if summaries.is_empty() {
        lines.push(format!("No runs recorded under `{}`.", root.join("reports").display()));
    }
    for summary in summaries {
        lines.push(format!("## Run `{}`", summary.run_id));
        lines.push(format!("- started: {}", summary.started_at));
        lines.push(format!("- policy: {}", summary.policy));
        lines.push(format!("- embedder: {}", summary.embedder));
        lines.push(format!("- matches: {}", summary.counts.matches));
        lines.push(format!(
            "- evaluated: {} (no peers: {}, embedding failures: {})",
            summary.counts.evaluated, summary.counts.skipped_no_peers, summary.counts.embedding_failures
        ));
        lines.push(format!("- output: `{}`", summary.output_path));
        if let Some(manifest) = &summary.parquet_manifest {
            lines.push(format!("- parquet manifest: `{manifest}`"));
        }
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn string_column<'a>(results: &'a [MatchResult], f: impl Fn(&'a MatchResult) -> &'a str) -> StringArray {
    StringArray::from(results.iter().map(|r| Some(f(r))).collect::<Vec<_>>())
}

fn write_matches_parquet(path: &Path, results: &[MatchResult]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("applicant_id", DataType::Utf8, false),
        ArrowField::new("job_req_id", DataType::Utf8, false),
        ArrowField::new("job_family", DataType::Utf8, false),
        ArrowField::new("location", DataType::Utf8, false),
        ArrowField::new("interview_score", DataType::UInt32, true),
        ArrowField::new("feedback_sentiment", DataType::Float64, true),
        ArrowField::new("matched_to_hired_id", DataType::Utf8, false),
        ArrowField::new("feedback_similarity", DataType::Float64, false),
        ArrowField::new("resume_jd_similarity", DataType::Float64, false),
        ArrowField::new("rediscovery_index_score", DataType::Float64, false),
        ArrowField::new("resume_highlights", DataType::Utf8, true),
        ArrowField::new("jd_match_points", DataType::Utf8, true),
    ]));

    let scores = UInt32Array::from(
        results
            .iter()
            .map(|r| match r.quality {
                QualitySignal::InterviewScore(s) => Some(u32::from(s)),
                QualitySignal::Sentiment(_) => None,
            })
            .collect::<Vec<_>>(),
    );
    let sentiments = Float64Array::from(
        results
            .iter()
            .map(|r| match r.quality {
                QualitySignal::Sentiment(p) => Some(round3(p)),
                QualitySignal::InterviewScore(_) => None,
            })
            .collect::<Vec<_>>(),
    );
    let resume_highlights = StringArray::from(
        results
            .iter()
            .map(|r| r.highlights.as_ref().map(|h| h.resume_highlights.join(HIGHLIGHT_SEPARATOR)))
            .collect::<Vec<_>>(),
    );
    let jd_points = StringArray::from(
        results
            .iter()
            .map(|r| r.highlights.as_ref().map(|h| h.jd_match_points.join(HIGHLIGHT_SEPARATOR)))
            .collect::<Vec<_>>(),
    );

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(string_column(results, |r| r.applicant_id.as_str())),
            Arc::new(string_column(results, |r| r.job_req_id.as_str())),
            Arc::new(string_column(results, |r| r.job_family.as_str())),
            Arc::new(string_column(results, |r| r.location.as_str())),
            Arc::new(scores),
            Arc::new(sentiments),
            Arc::new(string_column(results, |r| r.matched_to_hired_id.as_str())),
            Arc::new(Float64Array::from(results.iter().map(|r| r.feedback_similarity).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(results.iter().map(|r| r.resume_jd_similarity).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(
                results.iter().map(|r| r.rediscovery_index_score).collect::<Vec<_>>(),
            )),
            Arc::new(resume_highlights),
            Arc::new(jd_points),
        ],
    )
    .context("building candidate_matches record batch")?;
    write_parquet(path, batch)
}

fn manifest_entry(name: &str, reports_dir: &Path, path: &Path) -> Result<ParquetManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let rel = path
        .strip_prefix(reports_dir)
        .unwrap_or(path)
        .display()
        .to_string();
    Ok(ParquetManifestFile {
        name: name.to_string(),
        path: rel,
        sha256: ArtifactStore::sha256_hex(&bytes),
        bytes: bytes.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdx_core::{Application, Feedback, JobDescription, Requisition, Resume};
    use rdx_signals::{HashEmbedder, LexiconSentiment, RakeExtractor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed vectors for known texts and counts model calls.
    struct TableEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(entries: &[(&str, [f32; 2])]) -> Self {
            Self {
                vectors: entries.iter().map(|(t, v)| (t.to_string(), v.to_vec())).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for TableEmbedder {
        fn name(&self) -> &str {
            "table"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vectors.get(text).cloned().ok_or_else(|| EmbedError::Inference {
                reason: format!("no vector for {text:?}"),
            })
        }
    }

    fn signals_with(embedder: impl Embedder + 'static) -> Signals {
        Signals::new(
            Box::new(embedder),
            Box::<LexiconSentiment>::default(),
            Box::<RakeExtractor>::default(),
        )
    }

    fn app(applicant: &str, req: &str, family: &str, location: &str, hired: bool) -> Application {
        Application {
            applicant_id: applicant.into(),
            job_req_id: req.into(),
            application_date: "2024-03-01".into(),
            location: location.into(),
            job_family: family.into(),
            level: "L3".into(),
            hired,
        }
    }

    fn fb(applicant: &str, req: &str, text: &str, score: u8) -> Feedback {
        Feedback {
            applicant_id: applicant.into(),
            job_req_id: req.into(),
            interviewer: "Dana".into(),
            feedback_text: text.into(),
            interview_score: score,
        }
    }

    fn dataset(applications: Vec<Application>, feedback: Vec<Feedback>) -> Dataset {
        let mut reqs = applications.iter().map(|a| a.job_req_id.clone()).collect::<Vec<_>>();
        reqs.dedup();
        let mut applicants = applications.iter().map(|a| a.applicant_id.clone()).collect::<Vec<_>>();
        applicants.dedup();
        Dataset {
            requisitions: reqs
                .iter()
                .map(|r| Requisition {
                    job_req_id: r.clone(),
                    job_family: "Req Family".into(),
                    location: "Req City".into(),
                    level: "L9".into(),
                    status: "open".into(),
                })
                .collect(),
            resumes: applicants
                .iter()
                .map(|a| Resume {
                    applicant_id: a.clone(),
                    resume_text: "resume".into(),
                })
                .collect(),
            job_descriptions: reqs
                .iter()
                .map(|r| JobDescription {
                    job_req_id: r.clone(),
                    job_title: "Engineer".into(),
                    job_description: "jd".into(),
                })
                .collect(),
            applications,
            feedback,
        }
    }

    #[test]
    fn merge_keeps_application_values_and_suffixes_requisition_columns() {
        let data = dataset(
            vec![app("A1", "R1", "Engineering", "Austin", false)],
            vec![fb("A1", "R1", "first", 4), fb("A1", "R1", "second", 5)],
        );
        let merged = merge_records(&data, false).unwrap();
        assert_eq!(merged.records.len(), 2);
        let row = &merged.records[0];
        assert_eq!(row.job_family, "Engineering");
        assert_eq!(row.job_family_req, "Req Family");
        assert_eq!(row.location_req, "Req City");
        assert_eq!(row.level_req, "L9");
        assert_eq!(row.feedback_text, "first");
        assert_eq!(merged.records[1].feedback_text, "second");
    }

    #[test]
    fn merge_follows_application_order() {
        let data = dataset(
            vec![
                app("A2", "R1", "Engineering", "Austin", false),
                app("A1", "R1", "Engineering", "Austin", true),
            ],
            vec![fb("A1", "R1", "one", 4), fb("A2", "R1", "two", 4)],
        );
        let merged = merge_records(&data, false).unwrap();
        let ids = merged.records.iter().map(|r| r.applicant_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["A2", "A1"]);
    }

    #[test]
    fn merge_drops_incomplete_joins() {
        let mut data = dataset(
            vec![
                app("A1", "R1", "Engineering", "Austin", false),
                app("A2", "R2", "Engineering", "Austin", false),
            ],
            vec![fb("A1", "R1", "one", 4), fb("A2", "R2", "two", 4)],
        );
        data.resumes.retain(|r| r.applicant_id != "A2");
        let merged = merge_records(&data, false).unwrap();
        assert_eq!(merged.records.len(), 1);
        assert_eq!(merged.unjoined_applications, 1);
    }

    #[test]
    fn orphan_feedback_is_counted_or_rejected() {
        let data = dataset(
            vec![app("A1", "R1", "Engineering", "Austin", false)],
            vec![fb("A1", "R1", "one", 4), fb("GHOST", "R1", "two", 4)],
        );
        let lenient = merge_records(&data, false).unwrap();
        assert_eq!(lenient.orphan_feedback, 1);
        assert_eq!(lenient.records.len(), 1);

        let strict = merge_records(&data, true).unwrap_err();
        assert!(matches!(strict, DataError::OrphanFeedback { count: 1, .. }));
    }

    #[test]
    fn score_threshold_keeps_four_and_drops_three() {
        let data = dataset(
            vec![
                app("A1", "R1", "Engineering", "Austin", false),
                app("A2", "R1", "Engineering", "Austin", false),
                app("H1", "R1", "Engineering", "Austin", true),
            ],
            vec![fb("A1", "R1", "x", 4), fb("A2", "R1", "y", 3), fb("H1", "R1", "z", 3)],
        );
        let merged = merge_records(&data, false).unwrap();
        let split = partition(merged.records, FilterPolicy::ScoreThreshold, &LexiconSentiment::default()).unwrap();
        assert_eq!(split.not_hired.len(), 1);
        assert_eq!(split.not_hired[0].record.applicant_id, "A1");
        assert_eq!(split.not_hired[0].quality, QualitySignal::InterviewScore(4));
        assert!(split.hired.is_empty());
        assert_eq!(split.filtered_out, 2);
    }

    #[test]
    fn sentiment_threshold_passes_hired_rows_through() {
        let data = dataset(
            vec![
                app("A1", "R1", "Engineering", "Austin", false),
                app("A2", "R1", "Engineering", "Austin", false),
                app("H1", "R1", "Engineering", "Austin", true),
            ],
            vec![
                fb("A1", "R1", "Excellent and insightful answers", 2),
                fb("A2", "R1", "Weak and disorganized", 5),
                fb("H1", "R1", "Poor communication", 1),
            ],
        );
        let merged = merge_records(&data, false).unwrap();
        let split =
            partition(merged.records, FilterPolicy::SentimentThreshold, &LexiconSentiment::default()).unwrap();
        assert_eq!(split.hired.len(), 1);
        assert_eq!(split.not_hired.len(), 1);
        assert_eq!(split.not_hired[0].record.applicant_id, "A1");
        assert!(matches!(split.not_hired[0].quality, QualitySignal::Sentiment(p) if p > SENTIMENT_THRESHOLD));
    }

    #[test]
    fn non_finite_sentiment_is_a_data_error() {
        struct Broken;
        impl SentimentAnalyzer for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn polarity(&self, _text: &str) -> f64 {
                f64::NAN
            }
        }
        let data = dataset(
            vec![app("A1", "R1", "Engineering", "Austin", false)],
            vec![fb("A1", "R1", "fine", 4)],
        );
        let merged = merge_records(&data, false).unwrap();
        let err = partition(merged.records, FilterPolicy::SentimentThreshold, &Broken).unwrap_err();
        assert!(matches!(err, DataError::UnusableSignal { .. }));
    }

    #[test]
    fn peers_require_exact_family_and_location() {
        let data = dataset(
            vec![
                app("A1", "R1", "Engineering", "Austin", false),
                app("H1", "R1", "Engineering", "Austin", true),
                app("H2", "R1", "engineering", "Austin", true),
                app("H3", "R1", "Engineering", "Boston", true),
            ],
            vec![
                fb("A1", "R1", "a", 5),
                fb("H1", "R1", "b", 5),
                fb("H2", "R1", "c", 5),
                fb("H3", "R1", "d", 5),
            ],
        );
        let merged = merge_records(&data, false).unwrap();
        let split = partition(merged.records, FilterPolicy::ScoreThreshold, &LexiconSentiment::default()).unwrap();
        let peers = select_peers(&split.not_hired[0].record, &split.hired);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].record.applicant_id, "H1");
    }

    #[test]
    fn blank_text_scores_zero_without_embedding() {
        let embedder = TableEmbedder::new(&[("a", [1.0, 0.0])]);
        let mut engine = SimilarityEngine::new(&embedder);
        assert_eq!(engine.similarity("a", "   ").unwrap(), 0.0);
        assert_eq!(engine.similarity("", "a").unwrap(), 0.0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn similarity_engine_memoizes_vectors() {
        let embedder = TableEmbedder::new(&[("a", [1.0, 0.0]), ("b", [0.0, 1.0])]);
        let mut engine = SimilarityEngine::new(&embedder);
        engine.similarity("a", "b").unwrap();
        engine.similarity("a", "b").unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.cached_vectors(), 2);
    }

    #[test]
    fn best_match_keeps_first_maximum() {
        let embedder = TableEmbedder::new(&[("q", [1.0, 0.0]), ("x", [0.0, 1.0]), ("y", [2.0, 0.0]), ("z", [1.0, 0.0])]);
        let mut engine = SimilarityEngine::new(&embedder);
        let (idx, score) = engine.best_match("q", &["x", "y", "z"]).unwrap().unwrap();
        assert_eq!(idx, 1);
        assert!((score - 1.0).abs() < 1e-9);
        assert!(engine.best_match("q", &[]).unwrap().is_none());
    }

    #[test]
    fn qualification_uses_either_signal_at_threshold() {
        assert!(qualifies(0.7, 0.0));
        assert!(qualifies(0.1, 0.7));
        assert!(!qualifies(0.6999, 0.6999));
        assert_eq!(rediscovery_index(1.0, 0.5), 0.75);
        assert_eq!(rediscovery_index(0.9, 0.4449), 0.672);
    }

    fn scenario_dataset() -> Dataset {
        let mut data = dataset(
            vec![
                app("A1", "R1", "Engineering", "Austin", false),
                app("H1", "R1", "Engineering", "Austin", true),
                app("A2", "R2", "Design", "Denver", false),
            ],
            vec![
                fb("A1", "R1", "deep systems knowledge", 4),
                fb("H1", "R1", "deep systems knowledge", 5),
                fb("A2", "R2", "deep systems knowledge", 5),
            ],
        );
        data.resumes.iter_mut().for_each(|r| r.resume_text = "rust resume".into());
        data.job_descriptions.iter_mut().for_each(|d| d.job_description = "platform jd".into());
        data
    }

    #[test]
    fn near_identical_feedback_with_half_resume_fit_scores_three_quarters() {
        let embedder = TableEmbedder::new(&[
            ("deep systems knowledge", [1.0, 0.0]),
            ("rust resume", [1.0, 0.0]),
            ("platform jd", [0.5, 0.75f32.sqrt()]),
        ]);
        let outcome = match_candidates(&scenario_dataset(), &signals_with(embedder), &MatchConfig::default()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        let row = &outcome.results[0];
        assert_eq!(row.applicant_id, "A1");
        assert_eq!(row.matched_to_hired_id, "H1");
        assert!((row.feedback_similarity - 1.0).abs() < 1e-6);
        assert!((row.resume_jd_similarity - 0.5).abs() < 1e-6);
        assert_eq!(row.rediscovery_index_score, 0.75);
        assert_eq!(outcome.counts.skipped_no_peers, 1);
        assert_eq!(outcome.counts.matches, 1);
    }

    #[test]
    fn embedding_failure_excludes_only_that_candidate() {
        let embedder = TableEmbedder::new(&[("deep systems knowledge", [1.0, 0.0]), ("rust resume", [1.0, 0.0])]);
        let outcome = match_candidates(&scenario_dataset(), &signals_with(embedder), &MatchConfig::default()).unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.counts.embedding_failures, 1);
    }

    #[test]
    fn unembeddable_peer_is_skipped_and_remembered() {
        let mut data = dataset(
            vec![
                app("A1", "R1", "Engineering", "Austin", false),
                app("H1", "R1", "Engineering", "Austin", true),
                app("H2", "R1", "Engineering", "Austin", true),
                app("A3", "R1", "Engineering", "Austin", false),
            ],
            vec![
                fb("A1", "R1", "deep systems knowledge", 4),
                fb("H1", "R1", "garbled transcript", 5),
                fb("H2", "R1", "deep systems knowledge", 5),
                fb("A3", "R1", "deep systems knowledge", 4),
            ],
        );
        data.resumes.iter_mut().for_each(|r| r.resume_text = "rust resume".into());
        data.job_descriptions.iter_mut().for_each(|d| d.job_description = "platform jd".into());
        let embedder = TableEmbedder::new(&[
            ("deep systems knowledge", [1.0, 0.0]),
            ("rust resume", [1.0, 0.0]),
            ("platform jd", [1.0, 0.0]),
        ]);
        let signals = signals_with(embedder);
        let outcome = match_candidates(&data, &signals, &MatchConfig::default()).unwrap();

        let ids = outcome.results.iter().map(|r| r.applicant_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["A1", "A3"]);
        assert!(outcome.results.iter().all(|r| r.matched_to_hired_id == "H2"));
        assert_eq!(outcome.results[0].feedback_similarity, 1.0);
        assert_eq!(outcome.counts.embedding_failures, 0);
        assert_eq!(outcome.counts.failed_texts, 1);
    }

    #[test]
    fn failed_text_is_embedded_only_once() {
        let embedder = TableEmbedder::new(&[("q", [1.0, 0.0]), ("z", [1.0, 0.0])]);
        let mut engine = SimilarityEngine::new(&embedder);
        for _ in 0..3 {
            let (idx, _) = engine.best_match("q", &["bad", "z"]).unwrap().unwrap();
            assert_eq!(idx, 1);
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.failed_texts(), 1);
        assert!(engine.best_match("bad", &["z"]).is_err());
    }

    #[test]
    fn sentiment_cutoff_is_exclusive() {
        struct Fixed;
        impl SentimentAnalyzer for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            fn polarity(&self, text: &str) -> f64 {
                match text {
                    "at cutoff" => SENTIMENT_THRESHOLD,
                    "above cutoff" => SENTIMENT_THRESHOLD + 1e-9,
                    _ => -1.0,
                }
            }
        }
        let data = dataset(
            vec![
                app("A1", "R1", "Engineering", "Austin", false),
                app("A2", "R1", "Engineering", "Austin", false),
                app("H1", "R1", "Engineering", "Austin", true),
            ],
            vec![fb("A1", "R1", "at cutoff", 5), fb("A2", "R1", "above cutoff", 1), fb("H1", "R1", "hired", 5)],
        );
        let merged = merge_records(&data, false).unwrap();
        let split = partition(merged.records, FilterPolicy::SentimentThreshold, &Fixed).unwrap();
        assert_eq!(split.not_hired.len(), 1);
        assert_eq!(split.not_hired[0].record.applicant_id, "A2");
        assert_eq!(split.hired.len(), 1);
        assert_eq!(split.filtered_out, 1);
    }

    #[test]
    fn crate_names_follow_package_names() {
        assert_eq!(CRATE_NAME, "rdx-pipeline");
        assert_eq!(rdx_core::CRATE_NAME, "rdx-core");
        assert_eq!(rdx_signals::CRATE_NAME, "rdx-signals");
        assert_eq!(rdx_storage::CRATE_NAME, "rdx-storage");
    }

    #[test]
    fn default_config_uses_the_sentence_model() {
        assert_eq!(PipelineConfig::default().embedder, DEFAULT_EMBEDDER);
        assert_eq!(DEFAULT_EMBEDDER, "fastembed");
    }

    #[test]
    fn highlights_are_extracted_when_enabled() {
        let mut data = scenario_dataset();
        data.resumes[0].resume_text = "Built payment systems in Rust".into();
        let config = MatchConfig {
            highlights: true,
            highlight_top_n: 2,
            ..MatchConfig::default()
        };
        let outcome = match_candidates(&data, &signals_with(HashEmbedder::new(64)), &config).unwrap();
        let highlights = outcome.results[0].highlights.as_ref().unwrap();
        assert_eq!(highlights.resume_highlights[0], "built payment systems");
        assert!(highlights.resume_highlights.len() <= 2);
    }

    #[test]
    fn every_result_satisfies_output_invariants() {
        let families = ["Engineering", "Design"];
        let cities = ["Austin", "Denver"];
        let texts = [
            "excellent system design depth",
            "excellent system design breadth",
            "strong communication and ownership",
            "clear product thinking",
        ];
        let mut applications = Vec::new();
        let mut feedback = Vec::new();
        for i in 0..24 {
            let id = format!("P{i:02}");
            applications.push(app(&id, "R1", families[i % 2], cities[(i / 2) % 2], i % 3 == 0));
            feedback.push(fb(&id, "R1", texts[i % texts.len()], 4 + (i % 2) as u8));
        }
        let data = dataset(applications, feedback);
        let outcome = match_candidates(&data, &signals_with(HashEmbedder::new(128)), &MatchConfig::default()).unwrap();
        assert!(!outcome.results.is_empty());
        for row in &outcome.results {
            assert!(qualifies(row.feedback_similarity, row.resume_jd_similarity));
            assert_eq!(
                row.rediscovery_index_score,
                round3((row.feedback_similarity + row.resume_jd_similarity) / 2.0)
            );
            let peer = data.applications.iter().find(|a| a.applicant_id == row.matched_to_hired_id).unwrap();
            assert!(peer.hired);
            assert_eq!(peer.job_family, row.job_family);
            assert_eq!(peer.location, row.location);
        }
    }
}
