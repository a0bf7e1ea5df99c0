//! Axum + Askama dashboard over the rediscovery match table.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use askama::Template;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rdx_core::{DataError, FilterPolicy, SIMILARITY_THRESHOLD};
use rdx_pipeline::{recent_runs, PipelineConfig, RediscoveryPipeline, RunSummary};
use rdx_storage::{
    encode_table_rows, match_table_header, read_highlights_side_table, read_match_table,
    table_file_name, ArtifactStore, MatchTable, MatchTableRow, StorageError, APPLICATIONS,
    CANDIDATE_MATCHES, HIGHLIGHTS_SIDE_TABLE, INTERVIEW_FEEDBACK, JOB_DESCRIPTIONS, REQUISITIONS,
    RESUMES,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rdx-web";

const DEFAULT_CSS: &str = include_str!("../../../assets/static/app.css");

/// Lower index bound applied when a view request names none.
pub const DEFAULT_MIN_SCORE: f64 = SIMILARITY_THRESHOLD;

/// Input tables a dashboard run needs, by upload field name.
pub const UPLOAD_TABLES: [&str; 5] = [
    APPLICATIONS,
    INTERVIEW_FEEDBACK,
    REQUISITIONS,
    RESUMES,
    JOB_DESCRIPTIONS,
];

const UPLOAD_LIMIT_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub workspace_root: PathBuf,
    pub data_dir: PathBuf,
    pub output_path: PathBuf,
    /// Settings for runs started from uploaded tables; `data_dir` is replaced per upload.
    pub pipeline: PipelineConfig,
}

impl AppState {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        Self::from_config(&PipelineConfig {
            data_dir: workspace_root.join("data"),
            output_dir: workspace_root.join("outputs"),
            workspace_root,
            ..PipelineConfig::default()
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            workspace_root: config.workspace_root.clone(),
            data_dir: config.data_dir.clone(),
            output_path: config.output_path(),
            pipeline: config.clone(),
        }
    }
}

/// Dashboard and export filter; empty lists and missing bounds match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchFilter {
    pub families: Vec<String>,
    pub locations: Vec<String>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

impl MatchFilter {
    pub fn matches(&self, row: &MatchTableRow) -> bool {
        let score = row.rediscovery_index_score;
        (self.families.is_empty() || self.families.iter().any(|f| f == &row.job_family))
            && (self.locations.is_empty() || self.locations.iter().any(|l| l == &row.location))
            && self.min_score.map_or(true, |min| score >= min)
            && self.max_score.map_or(true, |max| score <= max)
    }

    pub fn apply(&self, rows: &[MatchTableRow]) -> Vec<MatchTableRow> {
        rows.iter().filter(|row| self.matches(row)).cloned().collect()
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_bound(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Query string of the match views; lists are comma-separated.
///
/// An absent `min_score` means [`DEFAULT_MIN_SCORE`]; a blank one means no lower bound.
#[derive(Debug, Deserialize, Default)]
pub struct MatchQuery {
    pub family: Option<String>,
    pub location: Option<String>,
    pub min_score: Option<String>,
    pub max_score: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl MatchQuery {
    pub fn filter(&self) -> MatchFilter {
        MatchFilter {
            families: split_list(self.family.as_deref()),
            locations: split_list(self.location.as_deref()),
            min_score: match self.min_score.as_deref() {
                None => Some(DEFAULT_MIN_SCORE),
                raw => parse_bound(raw),
            },
            max_score: parse_bound(self.max_score.as_deref()),
        }
    }
}

/// Read the match table and, when it carries no highlight columns, left-join
/// the optional highlights side-table on (applicant_id, job_req_id).
pub fn load_match_view(output_path: &Path, data_dir: &Path) -> anyhow::Result<MatchTable> {
    if !output_path.exists() {
        return Ok(MatchTable {
            header: match_table_header(FilterPolicy::default(), false)
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            rows: Vec::new(),
        });
    }
    let mut table = read_match_table(output_path)?;
    if table.has_column("resume_highlights") {
        return Ok(table);
    }

    let side_path = data_dir.join(table_file_name(HIGHLIGHTS_SIDE_TABLE));
    if !side_path.exists() {
        return Ok(table);
    }
    let highlights = read_highlights_side_table(&side_path)?
        .into_iter()
        .map(|h| ((h.applicant_id.clone(), h.job_req_id.clone()), h))
        .collect::<HashMap<_, _>>();
    for row in &mut table.rows {
        if let Some(h) = highlights.get(&(row.applicant_id.clone(), row.job_req_id.clone())) {
            row.resume_highlights = Some(h.resume_highlights.clone());
            row.jd_match_points = Some(h.jd_match_points.clone());
        }
    }
    table.header.push("resume_highlights".to_string());
    table.header.push("jd_match_points".to_string());
    Ok(table)
}

/// CSV bytes of the filtered view, in the same column layout as the source table.
pub fn export_filtered_csv(table: &MatchTable, filter: &MatchFilter) -> anyhow::Result<Vec<u8>> {
    encode_table_rows(&table.header, &filter.apply(&table.rows))
}

fn quality_column(table: &MatchTable) -> &'static str {
    if table.has_column(FilterPolicy::SentimentThreshold.quality_column()) {
        FilterPolicy::SentimentThreshold.quality_column()
    } else {
        FilterPolicy::ScoreThreshold.quality_column()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    pub applicant_id: String,
    pub job_req_id: String,
    pub job_family: String,
    pub location: String,
    pub quality: String,
    pub feedback_text: String,
    pub matched_to_hired_id: String,
    pub matched_feedback: String,
    pub resume_text: String,
    pub feedback_similarity: String,
    pub resume_jd_similarity: String,
    pub rediscovery_index_score: String,
    pub resume_highlights: String,
    pub jd_match_points: String,
}

impl MatchView {
    fn from_row(row: &MatchTableRow, quality_column: &str) -> Self {
        Self {
            applicant_id: row.applicant_id.clone(),
            job_req_id: row.job_req_id.clone(),
            job_family: row.job_family.clone(),
            location: row.location.clone(),
            quality: row.field(quality_column),
            feedback_text: row.feedback_text.clone(),
            matched_to_hired_id: row.matched_to_hired_id.clone(),
            matched_feedback: row.matched_feedback.clone(),
            resume_text: row.resume_text.clone(),
            feedback_similarity: format!("{:.3}", row.feedback_similarity),
            resume_jd_similarity: format!("{:.3}", row.resume_jd_similarity),
            rediscovery_index_score: format!("{:.3}", row.rediscovery_index_score),
            resume_highlights: row.resume_highlights.clone().unwrap_or_default(),
            jd_match_points: row.jd_match_points.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReportRow {
    pub run_id: String,
    pub started_at: String,
    pub policy: String,
    pub embedder: String,
    pub matches: usize,
    pub evaluated: usize,
    pub has_parquet_manifest: bool,
}

#[derive(Debug, Clone)]
struct FacetCountRow {
    value: String,
    count: usize,
    selected: bool,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    total_matches: usize,
    family_count: usize,
    location_count: usize,
    quality_column: String,
    latest_run_id: String,
}

#[derive(Template)]
#[template(path = "matches.html")]
struct MatchesPageTemplate {
    family: String,
    location: String,
    min_score: String,
    max_score: String,
    quality_column: String,
}

#[derive(Template)]
#[template(path = "matches_table_partial.html")]
struct MatchesTablePartialTemplate {
    matches: Vec<MatchView>,
    quality_column: String,
    page: usize,
    total_pages: usize,
    total_filtered: usize,
}

#[derive(Template)]
#[template(path = "matches_facets_partial.html")]
struct MatchesFacetsPartialTemplate {
    family_counts: Vec<FacetCountRow>,
    location_counts: Vec<FacetCountRow>,
}

#[derive(Template)]
#[template(path = "run_result_partial.html")]
struct RunResultPartialTemplate {
    run_id: String,
    matches: usize,
    evaluated: usize,
    skipped_no_peers: usize,
    filtered_out: usize,
    embedding_failures: usize,
}

#[derive(Template)]
#[template(path = "reports.html")]
struct ReportsTemplate {
    runs: Vec<RunReportRow>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/matches", get(matches_page_handler))
        .route("/matches/table", get(matches_table_handler))
        .route("/matches/facets", get(matches_facets_handler))
        .route("/matches/export.csv", get(matches_export_handler))
        .route(
            "/runs",
            post(upload_run_handler).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/reports", get(reports_handler))
        .route("/reports/chart", get(reports_chart_handler))
        .route("/assets/static/app.css", get(app_css_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("RDX_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let state = AppState::from_config(&PipelineConfig::from_env()?);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, output = %state.output_path.display(), "dashboard listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let loaded = load_match_view(&state.output_path, &state.data_dir)
        .and_then(|table| Ok((table, load_runs(&state.workspace_root, 1)?)));
    match loaded {
        Ok((table, runs)) => {
            let (families, locations) = facet_counts(&table.rows, &MatchFilter::default());
            render_html(IndexTemplate {
                total_matches: table.rows.len(),
                family_count: families.len(),
                location_count: locations.len(),
                quality_column: quality_column(&table).to_string(),
                latest_run_id: runs.first().map(|r| r.run_id.clone()).unwrap_or_else(|| "n/a".into()),
            })
        }
        Err(err) => server_error(err),
    }
}

async fn matches_page_handler(State(state): State<Arc<AppState>>, Query(query): Query<MatchQuery>) -> Response {
    match load_match_view(&state.output_path, &state.data_dir) {
        Ok(table) => render_html(MatchesPageTemplate {
            family: query.family.unwrap_or_default(),
            location: query.location.unwrap_or_default(),
            min_score: query
                .min_score
                .unwrap_or_else(|| DEFAULT_MIN_SCORE.to_string()),
            max_score: query.max_score.unwrap_or_default(),
            quality_column: quality_column(&table).to_string(),
        }),
        Err(err) => server_error(err),
    }
}

async fn matches_table_handler(State(state): State<Arc<AppState>>, Query(query): Query<MatchQuery>) -> Response {
    match load_match_view(&state.output_path, &state.data_dir) {
        Ok(table) => {
            let column = quality_column(&table);
            let (page_rows, page, total_pages, total_filtered) = filtered_paginated_matches(&table.rows, &query);
            let mut resp = render_html(MatchesTablePartialTemplate {
                matches: page_rows.iter().map(|row| MatchView::from_row(row, column)).collect(),
                quality_column: column.to_string(),
                page,
                total_pages,
                total_filtered,
            });
            resp.headers_mut().insert(
                header::HeaderName::from_static("hx-trigger"),
                header::HeaderValue::from_static("matchesTableLoaded"),
            );
            resp
        }
        Err(err) => server_error(err),
    }
}

async fn matches_facets_handler(State(state): State<Arc<AppState>>, Query(query): Query<MatchQuery>) -> Response {
    match load_match_view(&state.output_path, &state.data_dir) {
        Ok(table) => {
            let (family_counts, location_counts) = facet_counts(&table.rows, &query.filter());
            render_html(MatchesFacetsPartialTemplate {
                family_counts,
                location_counts,
            })
        }
        Err(err) => server_error(err),
    }
}

async fn matches_export_handler(State(state): State<Arc<AppState>>, Query(query): Query<MatchQuery>) -> Response {
    let exported = load_match_view(&state.output_path, &state.data_dir)
        .and_then(|table| export_filtered_csv(&table, &query.filter()));
    match exported {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"candidate_matches_filtered.csv\"",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => server_error(err),
    }
}

/// Save the five uploaded tables into a fresh data dir and run the pipeline over them.
async fn upload_run_handler(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let upload_dir = state
        .workspace_root
        .join("uploads")
        .join(Uuid::new_v4().to_string());
    let saved = match save_uploaded_tables(multipart, &upload_dir).await {
        Ok(saved) => saved,
        Err(err) => return client_error(StatusCode::BAD_REQUEST, err),
    };
    let missing = UPLOAD_TABLES
        .into_iter()
        .filter(|table| !saved.contains(table))
        .map(table_file_name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return client_error(
            StatusCode::BAD_REQUEST,
            anyhow::anyhow!("missing uploads: {}", missing.join(", ")),
        );
    }

    let config = PipelineConfig {
        data_dir: upload_dir,
        ..state.pipeline.clone()
    };
    match run_uploaded(config).await {
        Ok(summary) => {
            let mut resp = render_html(RunResultPartialTemplate {
                run_id: summary.run_id.to_string(),
                matches: summary.counts.matches,
                evaluated: summary.counts.evaluated,
                skipped_no_peers: summary.counts.skipped_no_peers,
                filtered_out: summary.counts.filtered_out,
                embedding_failures: summary.counts.embedding_failures,
            });
            resp.headers_mut().insert(
                header::HeaderName::from_static("hx-trigger"),
                header::HeaderValue::from_static("runCompleted"),
            );
            resp
        }
        Err(err) if is_data_error(&err) => client_error(StatusCode::UNPROCESSABLE_ENTITY, err),
        Err(err) => server_error(err),
    }
}

async fn save_uploaded_tables(mut multipart: Multipart, dir: &Path) -> anyhow::Result<Vec<&'static str>> {
    let store = ArtifactStore::new(dir);
    let mut saved = Vec::new();
    while let Some(field) = multipart.next_field().await.context("reading multipart upload")? {
        let label = field
            .name()
            .or_else(|| field.file_name())
            .unwrap_or_default()
            .to_string();
        let Some(table) = upload_table(&label) else {
            debug!(field = %label, "ignoring unknown upload field");
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .with_context(|| format!("reading upload {label}"))?;
        store.write_atomic(table_file_name(table), &bytes).await?;
        saved.push(table);
    }
    info!(tables = saved.len(), dir = %dir.display(), "uploaded tables saved");
    Ok(saved)
}

/// Input table named by an upload field, with or without the `.csv` suffix.
fn upload_table(label: &str) -> Option<&'static str> {
    let stem = label.trim();
    let stem = stem.strip_suffix(".csv").unwrap_or(stem);
    UPLOAD_TABLES.iter().copied().find(|table| *table == stem)
}

async fn run_uploaded(config: PipelineConfig) -> anyhow::Result<RunSummary> {
    // Loading a sentence model blocks on disk and network.
    let pipeline = tokio::task::spawn_blocking(move || RediscoveryPipeline::from_config(config))
        .await
        .context("building pipeline")??;
    pipeline.run_once().await
}

fn is_data_error(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.is::<DataError>() || cause.is::<StorageError>())
}

async fn reports_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_runs(&state.workspace_root, 20) {
        Ok(runs) => render_html(ReportsTemplate { runs }),
        Err(err) => server_error(err),
    }
}

async fn reports_chart_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_runs(&state.workspace_root, 20) {
        Ok(runs) => {
            let x = runs.iter().rev().map(|r| r.started_at.clone()).collect::<Vec<_>>();
            let y = runs.iter().rev().map(|r| r.matches as i64).collect::<Vec<_>>();
            Json(serde_json::json!({
                "data": [{
                    "type": "bar",
                    "x": x,
                    "y": y,
                    "marker": {"color": "#0ea5e9"}
                }],
                "layout": {
                    "title": "Rediscovery Matches Per Run",
                    "paper_bgcolor": "#ffffff",
                    "plot_bgcolor": "#f8fafc"
                }
            }))
            .into_response()
        }
        Err(err) => server_error(err),
    }
}

async fn app_css_handler(State(state): State<Arc<AppState>>) -> Response {
    let css_path = state.workspace_root.join("assets/static/app.css");
    let css = tokio::fs::read_to_string(&css_path)
        .await
        .unwrap_or_else(|_| DEFAULT_CSS.to_string());
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], css).into_response()
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn client_error(status: StatusCode, err: anyhow::Error) -> Response {
    warn!(status = %status, error = %format!("{err:#}"), "rejected dashboard run");
    (status, Html(format!("Upload error: {err:#}"))).into_response()
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {err:#}")),
    )
        .into_response()
}

fn load_runs(workspace_root: &Path, limit: usize) -> anyhow::Result<Vec<RunReportRow>> {
    Ok(recent_runs(workspace_root, limit)?
        .into_iter()
        .map(|summary| RunReportRow {
            run_id: summary.run_id.to_string(),
            started_at: summary.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            policy: summary.policy.to_string(),
            embedder: summary.embedder,
            matches: summary.counts.matches,
            evaluated: summary.counts.evaluated,
            has_parquet_manifest: summary
                .parquet_manifest
                .as_deref()
                .is_some_and(|p| Path::new(p).exists()),
        })
        .collect())
}

/// Facet counts over rows passing the score bounds; selection marks follow the filter lists.
fn facet_counts(rows: &[MatchTableRow], filter: &MatchFilter) -> (Vec<FacetCountRow>, Vec<FacetCountRow>) {
    let bounds_only = MatchFilter {
        families: Vec::new(),
        locations: Vec::new(),
        ..filter.clone()
    };
    let mut families = BTreeMap::<String, usize>::new();
    let mut locations = BTreeMap::<String, usize>::new();
    for row in rows.iter().filter(|row| bounds_only.matches(row)) {
        *families.entry(row.job_family.clone()).or_default() += 1;
        *locations.entry(row.location.clone()).or_default() += 1;
    }
    let to_rows = |counts: BTreeMap<String, usize>, selected: &[String]| {
        counts
            .into_iter()
            .map(|(value, count)| FacetCountRow {
                selected: selected.iter().any(|s| s == &value),
                value,
                count,
            })
            .collect::<Vec<_>>()
    };
    (to_rows(families, &filter.families), to_rows(locations, &filter.locations))
}

fn filtered_paginated_matches(all: &[MatchTableRow], query: &MatchQuery) -> (Vec<MatchTableRow>, usize, usize, usize) {
    let filtered = query.filter().apply(all);
    let total_filtered = filtered.len();
    let per_page = query.per_page.unwrap_or(25).max(1);
    let total_pages = filtered.len().max(1).div_ceil(per_page);
    let page = query.page.unwrap_or(1).clamp(1, total_pages);
    let start = (page - 1) * per_page;
    let page_rows = filtered.into_iter().skip(start).take(per_page).collect::<Vec<_>>();
    (page_rows, page, total_pages, total_filtered)
}
