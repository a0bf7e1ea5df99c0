//! Seed-deterministic synthetic hiring data for demos and tests.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdx_core::{Application, Dataset, Feedback, JobDescription, Requisition, Resume};
use rdx_storage::{
    table_file_name, ArtifactStore, APPLICATIONS, APPLICATION_COLUMNS, FEEDBACK_COLUMNS,
    INTERVIEW_FEEDBACK, JOB_DESCRIPTIONS, JOB_DESCRIPTION_COLUMNS, REQUISITIONS,
    REQUISITION_COLUMNS, RESUMES, RESUME_COLUMNS,
};
use serde::Serialize;
use tracing::info;

pub const CRATE_NAME: &str = "rdx-fixtures";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureConfig {
    pub seed: u64,
    pub applicants: usize,
    pub requisitions: usize,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            applicants: 60,
            requisitions: 8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureReport {
    pub written: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

struct FamilyProfile {
    name: &'static str,
    titles: &'static [&'static str],
    skills: &'static [&'static str],
}

const FAMILIES: &[FamilyProfile] = &[
    FamilyProfile {
        name: "Engineering",
        titles: &["Backend Engineer", "Platform Engineer", "Site Reliability Engineer"],
        skills: &[
            "distributed systems",
            "payment services in Rust",
            "Kubernetes operations",
            "API design",
            "incident response",
            "database performance tuning",
        ],
    },
    FamilyProfile {
        name: "Data Science",
        titles: &["Data Scientist", "Machine Learning Engineer"],
        skills: &[
            "experiment design",
            "causal inference",
            "feature engineering",
            "model deployment",
            "forecasting pipelines",
        ],
    },
    FamilyProfile {
        name: "Product",
        titles: &["Product Manager", "Technical Product Manager"],
        skills: &[
            "roadmap planning",
            "customer discovery",
            "pricing strategy",
            "stakeholder alignment",
            "metrics definition",
        ],
    },
    FamilyProfile {
        name: "Design",
        titles: &["Product Designer", "UX Researcher"],
        skills: &[
            "interaction design",
            "usability research",
            "design systems",
            "prototyping",
            "accessibility reviews",
        ],
    },
];

const LOCATIONS: &[&str] = &["Austin", "Denver", "New York", "Remote"];
const LEVELS: &[&str] = &["L2", "L3", "L4", "L5"];
const STATUSES: &[&str] = &["open", "filled", "closed"];
const INTERVIEWERS: &[&str] = &["Avery", "Jordan", "Morgan", "Riley", "Quinn", "Casey"];

const STRONG_FEEDBACK: &[&str] = &[
    "Excellent depth in {skill} with clear tradeoff reasoning",
    "Strong hands-on experience with {skill}; very thoughtful answers",
    "Impressive ownership of {skill} and great communication",
];
const MIXED_FEEDBACK: &[&str] = &[
    "Solid grasp of {skill} but answers were somewhat vague",
    "Good communicator though limited exposure to {skill}",
];
const WEAK_FEEDBACK: &[&str] = &[
    "Struggled with {skill} and seemed unprepared",
    "Weak fundamentals in {skill}; not a fit for the level",
];

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    &items[rng.random_range(0..items.len())]
}

fn feedback_for(rng: &mut StdRng, skill: &str, hired: bool) -> (String, u8) {
    let roll: u32 = if hired { rng.random_range(70..100) } else { rng.random_range(0..100) };
    let (templates, score) = if roll >= 70 {
        (STRONG_FEEDBACK, rng.random_range(4..=5))
    } else if roll >= 35 {
        (MIXED_FEEDBACK, rng.random_range(3..=4))
    } else {
        (WEAK_FEEDBACK, rng.random_range(1..=2))
    };
    (pick(rng, templates).replace("{skill}", skill), score)
}

/// Build the five input relations from `config.seed`; equal configs give equal datasets.
pub fn generate_dataset(config: &FixtureConfig) -> Dataset {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut dataset = Dataset::default();

    let requisition_count = config.requisitions.max(1);
    let mut req_families = Vec::with_capacity(requisition_count);
    for i in 0..requisition_count {
        let family = pick(&mut rng, FAMILIES);
        let job_req_id = format!("REQ-{:04}", 1001 + i);
        let location = *pick(&mut rng, LOCATIONS);
        let level = *pick(&mut rng, LEVELS);
        let skills = (0..3).map(|_| *pick(&mut rng, family.skills)).collect::<Vec<_>>();
        let title = *pick(&mut rng, family.titles);

        dataset.requisitions.push(Requisition {
            job_req_id: job_req_id.clone(),
            job_family: family.name.to_string(),
            location: location.to_string(),
            level: level.to_string(),
            status: pick(&mut rng, STATUSES).to_string(),
        });
        dataset.job_descriptions.push(JobDescription {
            job_req_id,
            job_title: title.to_string(),
            job_description: format!(
                "We are hiring a {level} {title} in {location}. You will own {}, drive {} and partner with the team on {}.",
                skills[0], skills[1], skills[2]
            ),
        });
        req_families.push(family);
    }

    for n in 0..config.applicants {
        let applicant_id = format!("APP-{:05}", n + 1);
        let first = rng.random_range(0..requisition_count);
        let mut applied = vec![first];
        if rng.random_bool(0.2) && requisition_count > 1 {
            let second = (first + rng.random_range(1..requisition_count)) % requisition_count;
            applied.push(second);
        }

        let home_family = req_families[first];
        let resume_skills = (0..3).map(|_| *pick(&mut rng, home_family.skills)).collect::<Vec<_>>();
        dataset.resumes.push(Resume {
            applicant_id: applicant_id.clone(),
            resume_text: format!(
                "{} with {} years of experience. Delivered {} and {}; recently focused on {}.",
                pick(&mut rng, home_family.titles),
                rng.random_range(2..12u32),
                resume_skills[0],
                resume_skills[1],
                resume_skills[2]
            ),
        });

        for req_idx in applied {
            let req = &dataset.requisitions[req_idx];
            let hired = rng.random_bool(0.25);
            dataset.applications.push(Application {
                applicant_id: applicant_id.clone(),
                job_req_id: req.job_req_id.clone(),
                application_date: format!(
                    "2024-{:02}-{:02}",
                    rng.random_range(1..=12u32),
                    rng.random_range(1..=28u32)
                ),
                location: req.location.clone(),
                job_family: req.job_family.clone(),
                level: req.level.clone(),
                hired,
            });

            let rounds = rng.random_range(1..=2);
            for _ in 0..rounds {
                let skill = *pick(&mut rng, req_families[req_idx].skills);
                let (feedback_text, interview_score) = feedback_for(&mut rng, skill, hired);
                dataset.feedback.push(Feedback {
                    applicant_id: applicant_id.clone(),
                    job_req_id: req.job_req_id.clone(),
                    interviewer: pick(&mut rng, INTERVIEWERS).to_string(),
                    feedback_text,
                    interview_score,
                });
            }
        }
    }

    dataset
}

fn encode_rows<T: Serialize>(header: &[&str], rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(header).context("writing fixture header")?;
    for row in rows {
        writer.serialize(row).context("writing fixture row")?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flushing fixture table: {}", err.error()))
}

/// Write generated tables into `data_dir`, leaving any existing file untouched.
pub async fn generate_missing(data_dir: &Path, config: &FixtureConfig) -> Result<FixtureReport> {
    let dataset = generate_dataset(config);
    let tables = [
        (APPLICATIONS, encode_rows(&APPLICATION_COLUMNS, &dataset.applications)?),
        (INTERVIEW_FEEDBACK, encode_rows(&FEEDBACK_COLUMNS, &dataset.feedback)?),
        (REQUISITIONS, encode_rows(&REQUISITION_COLUMNS, &dataset.requisitions)?),
        (RESUMES, encode_rows(&RESUME_COLUMNS, &dataset.resumes)?),
        (JOB_DESCRIPTIONS, encode_rows(&JOB_DESCRIPTION_COLUMNS, &dataset.job_descriptions)?),
    ];

    let store = ArtifactStore::new(data_dir);
    let mut report = FixtureReport::default();
    for (table, bytes) in tables {
        let file_name = table_file_name(table);
        let path = data_dir.join(&file_name);
        if path.exists() {
            report.kept.push(path);
            continue;
        }
        let stored = store
            .write_atomic(&file_name, &bytes)
            .await
            .with_context(|| format!("writing fixture {}", path.display()))?;
        report.written.push(stored.absolute_path);
    }

    info!(
        seed = config.seed,
        written = report.written.len(),
        kept = report.kept.len(),
        data_dir = %data_dir.display(),
        "fixtures generated"
    );
    Ok(report)
}
