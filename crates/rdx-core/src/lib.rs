//! Core domain rows, scoring constants and data-quality errors for the rediscovery index.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "rdx-core";

/// Either similarity signal at or above this value qualifies a candidate.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Inclusive interview score cutoff for [`FilterPolicy::ScoreThreshold`].
pub const MIN_INTERVIEW_SCORE: u8 = 4;

/// Exclusive polarity cutoff for not-hired rows under [`FilterPolicy::SentimentThreshold`].
pub const SENTIMENT_THRESHOLD: f64 = 0.2;

pub const INTERVIEW_SCORE_RANGE: RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub applicant_id: String,
    pub job_req_id: String,
    pub application_date: String,
    pub location: String,
    pub job_family: String,
    pub level: String,
    pub hired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub applicant_id: String,
    pub job_req_id: String,
    pub interviewer: String,
    pub feedback_text: String,
    pub interview_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requisition {
    pub job_req_id: String,
    pub job_family: String,
    pub location: String,
    pub level: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    pub applicant_id: String,
    pub resume_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescription {
    pub job_req_id: String,
    pub job_title: String,
    pub job_description: String,
}

/// The five input relations of one run, already schema-checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub applications: Vec<Application>,
    pub feedback: Vec<Feedback>,
    pub requisitions: Vec<Requisition>,
    pub resumes: Vec<Resume>,
    pub job_descriptions: Vec<JobDescription>,
}

/// One joined (applicant, requisition, feedback) row.
///
/// `location`, `job_family` and `level` come from the application and drive
/// matching; the requisition's copies carry a `_req` suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub applicant_id: String,
    pub job_req_id: String,
    pub application_date: String,
    pub location: String,
    pub job_family: String,
    pub level: String,
    pub hired: bool,
    pub interviewer: String,
    pub feedback_text: String,
    pub interview_score: u8,
    pub job_family_req: String,
    pub location_req: String,
    pub level_req: String,
    pub status: String,
    pub resume_text: String,
    pub job_title: String,
    pub job_description: String,
}

/// Which feedback-quality bar the filter applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Keep rows with `interview_score >= MIN_INTERVIEW_SCORE`.
    #[default]
    ScoreThreshold,
    /// Keep not-hired rows whose feedback polarity exceeds `SENTIMENT_THRESHOLD`;
    /// hired rows pass through.
    SentimentThreshold,
}

impl FilterPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterPolicy::ScoreThreshold => "score",
            FilterPolicy::SentimentThreshold => "sentiment",
        }
    }

    /// Output column carrying the quality signal for this policy.
    pub fn quality_column(&self) -> &'static str {
        match self {
            FilterPolicy::ScoreThreshold => "interview_score",
            FilterPolicy::SentimentThreshold => "feedback_sentiment",
        }
    }
}

impl fmt::Display for FilterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "score" | "score_threshold" | "score-threshold" => Ok(FilterPolicy::ScoreThreshold),
            "sentiment" | "sentiment_threshold" | "sentiment-threshold" => {
                Ok(FilterPolicy::SentimentThreshold)
            }
            other => Err(format!("unknown filter policy {other:?} (expected score|sentiment)")),
        }
    }
}

/// Feedback-quality value carried into the output row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QualitySignal {
    InterviewScore(u8),
    Sentiment(f64),
}

impl fmt::Display for QualitySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualitySignal::InterviewScore(score) => write!(f, "{score}"),
            QualitySignal::Sentiment(polarity) => write!(f, "{}", round3(*polarity)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Highlights {
    pub resume_highlights: Vec<String>,
    pub jd_match_points: Vec<String>,
}

/// A qualifying not-hired candidate together with its best hired peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub applicant_id: String,
    pub job_req_id: String,
    pub job_family: String,
    pub location: String,
    pub quality: QualitySignal,
    pub feedback_text: String,
    pub resume_text: String,
    pub matched_to_hired_id: String,
    pub matched_feedback: String,
    pub feedback_similarity: f64,
    pub resume_jd_similarity: f64,
    pub rediscovery_index_score: f64,
    pub highlights: Option<Highlights>,
}

/// Schema and referential violations in the input tables.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("{table}: missing required column `{column}`")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
    #[error("{table} line {line}: column `{column}` has invalid value {value:?}: {reason}")]
    InvalidValue {
        table: &'static str,
        line: u64,
        column: &'static str,
        value: String,
        reason: String,
    },
    #[error("{table} line {line}: interview_score {score} outside {min}..={max}")]
    ScoreOutOfRange {
        table: &'static str,
        line: u64,
        score: i64,
        min: u8,
        max: u8,
    },
    #[error("{table}: duplicate key {key:?} on lines {first} and {second}")]
    DuplicateKey {
        table: &'static str,
        key: String,
        first: u64,
        second: u64,
    },
    #[error("no usable {signal} for feedback ({applicant_id}, {job_req_id}): {value}")]
    UnusableSignal {
        signal: &'static str,
        applicant_id: String,
        job_req_id: String,
        value: String,
    },
    #[error(
        "interview_feedback: {count} row(s) reference no application, first ({applicant_id}, {job_req_id})"
    )]
    OrphanFeedback {
        count: usize,
        applicant_id: String,
        job_req_id: String,
    },
}

/// Collapse newlines, carriage returns and double quotes to single spaces and trim.
pub fn normalize_text(input: &str) -> String {
    input
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '"') { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Round half away from zero to three decimals.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_flattens_line_breaks_and_quotes() {
        let raw = "  Strong \"team player\"\r\nwith\n\nclear  communication ";
        assert_eq!(normalize_text(raw), "Strong team player with clear communication");
    }

    #[test]
    fn normalize_text_of_blank_input_is_empty() {
        assert_eq!(normalize_text(" \n\r\t "), "");
    }

    #[test]
    fn round3_rounds_to_three_decimals() {
        assert_eq!(round3(0.74949), 0.749);
        assert_eq!(round3(0.7496), 0.75);
        assert_eq!(round3(-0.12345), -0.123);
    }

    #[test]
    fn filter_policy_parses_aliases() {
        assert_eq!("score".parse::<FilterPolicy>().unwrap(), FilterPolicy::ScoreThreshold);
        assert_eq!(
            " Sentiment ".parse::<FilterPolicy>().unwrap(),
            FilterPolicy::SentimentThreshold
        );
        assert!("fuzzy".parse::<FilterPolicy>().is_err());
    }

    #[test]
    fn quality_signal_display_matches_column_format() {
        assert_eq!(QualitySignal::InterviewScore(4).to_string(), "4");
        assert_eq!(QualitySignal::Sentiment(0.41666).to_string(), "0.417");
        assert_eq!(FilterPolicy::SentimentThreshold.quality_column(), "feedback_sentiment");
    }

    #[test]
    fn interview_score_range_is_one_to_five() {
        assert!(INTERVIEW_SCORE_RANGE.contains(&MIN_INTERVIEW_SCORE));
        assert!(!INTERVIEW_SCORE_RANGE.contains(&0));
        assert!(!INTERVIEW_SCORE_RANGE.contains(&6));
    }
}
