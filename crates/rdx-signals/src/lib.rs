//! Text signal contracts (embedding, sentiment, keyword extraction) and their built-in implementations.
//!
//! The pipeline never reaches for a global model: callers build a [`Signals`]
//! bundle once per run and hand it in.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use strsim::jaro_winkler;
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(feature = "fastembed")]
mod fastembed_embedder;
#[cfg(feature = "fastembed")]
pub use fastembed_embedder::FastEmbedEmbedder;

pub const CRATE_NAME: &str = "rdx-signals";

pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Pretrained sentence model used unless a run asks for another embedder.
pub const DEFAULT_EMBEDDER: &str = "fastembed";

/// Offline feature-hashing embedder for tests and air-gapped runs.
pub const HASH_EMBEDDER: &str = "hash";

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("loading embedding model {model}: {reason}")]
    ModelLoad { model: String, reason: String },
    #[error("embedding inference failed: {reason}")]
    Inference { reason: String },
    #[error("embedder returned {got} vectors for {expected} inputs")]
    BatchSize { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("unknown embedder {0:?} (expected hash|fastembed)")]
    UnknownEmbedder(String),
    #[error("embedder {0:?} requires building with the `fastembed` feature")]
    FeatureDisabled(String),
    #[error(transparent)]
    Embed(#[from] EmbedError),
}

/// Maps text to a fixed-length vector. Implementations must be deterministic.
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Batch variant; model backends override this to amortize inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Polarity of free text in `[-1, 1]`, positive meaning favorable.
pub trait SentimentAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    fn polarity(&self, text: &str) -> f64;
}

/// Ranked key phrases, best first.
pub trait KeywordExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, text: &str, top_n: usize) -> Vec<String>;
}

/// The per-run set of text models, constructed once and shared read-only.
pub struct Signals {
    pub embedder: Box<dyn Embedder>,
    pub sentiment: Box<dyn SentimentAnalyzer>,
    pub keywords: Box<dyn KeywordExtractor>,
}

impl Signals {
    pub fn new(
        embedder: Box<dyn Embedder>,
        sentiment: Box<dyn SentimentAnalyzer>,
        keywords: Box<dyn KeywordExtractor>,
    ) -> Self {
        Self {
            embedder,
            sentiment,
            keywords,
        }
    }

    /// Built-in lexicon and stopwords, with overrides from `<root>/rules/*.yaml` when present.
    pub fn from_workspace_root(root: &Path, embedder: Box<dyn Embedder>) -> Result<Self> {
        Ok(Self::new(
            embedder,
            Box::new(LexiconSentiment::from_workspace_root(root)?),
            Box::new(RakeExtractor::from_workspace_root(root)?),
        ))
    }
}

/// Resolve an embedder by configured name; a blank name means [`DEFAULT_EMBEDDER`].
///
/// `dimension` only applies to the hashing embedder; the sentence model has a fixed width.
pub fn embedder_for_name(name: &str, dimension: usize) -> Result<Box<dyn Embedder>, SignalError> {
    let name = match name.trim() {
        "" => DEFAULT_EMBEDDER.to_string(),
        other => other.to_ascii_lowercase(),
    };
    match name.as_str() {
        HASH_EMBEDDER => Ok(Box::new(HashEmbedder::new(dimension))),
        #[cfg(feature = "fastembed")]
        "fastembed" | "minilm" => Ok(Box::new(FastEmbedEmbedder::try_default()?)),
        #[cfg(not(feature = "fastembed"))]
        "fastembed" | "minilm" => Err(SignalError::FeatureDisabled(name)),
        other => Err(SignalError::UnknownEmbedder(other.to_string())),
    }
}

/// Cosine similarity clamped to `[-1, 1]`; zero-norm or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        warn!(
            a_len = a.len(),
            b_len = b.len(),
            "embedding dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Lowercased alphanumeric word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Feature-hashing embedder over word unigrams and bigrams.
///
/// Needs no model files and is fully deterministic, so it is the default and
/// the fallback for air-gapped runs.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash-fnv1a"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.vector(text))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SentimentRulesFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    lexicon: HashMap<String, f64>,
    #[serde(default)]
    negators: Vec<String>,
    #[serde(default)]
    intensifiers: HashMap<String, f64>,
}

const DEFAULT_LEXICON: &[(&str, f64)] = &[
    ("excellent", 1.0),
    ("outstanding", 1.0),
    ("exceptional", 0.9),
    ("impressive", 0.9),
    ("superb", 0.9),
    ("brilliant", 0.9),
    ("great", 0.8),
    ("fantastic", 0.8),
    ("strong", 0.5),
    ("good", 0.7),
    ("solid", 0.5),
    ("effective", 0.6),
    ("clear", 0.4),
    ("thoughtful", 0.5),
    ("insightful", 0.6),
    ("confident", 0.5),
    ("creative", 0.5),
    ("collaborative", 0.4),
    ("proactive", 0.5),
    ("positive", 0.5),
    ("knowledgeable", 0.5),
    ("skilled", 0.5),
    ("capable", 0.4),
    ("articulate", 0.5),
    ("passionate", 0.5),
    ("motivated", 0.4),
    ("reliable", 0.4),
    ("promising", 0.5),
    ("enthusiastic", 0.5),
    ("deep", 0.3),
    ("polished", 0.5),
    ("recommend", 0.5),
    ("impressed", 0.8),
    ("fit", 0.3),
    ("adequate", 0.1),
    ("average", -0.1),
    ("mediocre", -0.5),
    ("poor", -0.6),
    ("weak", -0.5),
    ("bad", -0.7),
    ("terrible", -1.0),
    ("lacking", -0.5),
    ("lacked", -0.5),
    ("limited", -0.3),
    ("unclear", -0.4),
    ("vague", -0.4),
    ("struggled", -0.5),
    ("confused", -0.5),
    ("unprepared", -0.6),
    ("concern", -0.3),
    ("concerns", -0.3),
    ("inconsistent", -0.4),
    ("superficial", -0.4),
    ("rude", -0.8),
    ("arrogant", -0.7),
    ("disorganized", -0.5),
    ("nervous", -0.2),
    ("difficult", -0.3),
    ("slow", -0.3),
    ("gaps", -0.3),
];

const DEFAULT_NEGATORS: &[&str] = &["not", "no", "never", "hardly", "without", "isn't", "wasn't", "didn't", "don't", "lacks"];

const DEFAULT_INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("extremely", 1.5),
    ("highly", 1.3),
    ("really", 1.2),
    ("truly", 1.2),
    ("somewhat", 0.6),
    ("slightly", 0.5),
];

/// How many tokens a negator or intensifier reaches forward.
const MODIFIER_WINDOW: usize = 3;

/// Lexicon-based polarity: the mean valence of sentiment-bearing words,
/// flipped and damped after a negator, scaled after an intensifier.
#[derive(Debug, Clone)]
pub struct LexiconSentiment {
    lexicon: HashMap<String, f64>,
    negators: HashSet<String>,
    intensifiers: HashMap<String, f64>,
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self {
            lexicon: DEFAULT_LEXICON
                .iter()
                .map(|(w, s)| (w.to_string(), *s))
                .collect(),
            negators: DEFAULT_NEGATORS.iter().map(|w| w.to_string()).collect(),
            intensifiers: DEFAULT_INTENSIFIERS
                .iter()
                .map(|(w, s)| (w.to_string(), *s))
                .collect(),
        }
    }
}

impl LexiconSentiment {
    pub fn from_workspace_root(root: &Path) -> Result<Self> {
        let path = root.join("rules").join("sentiment.yaml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let rules: SentimentRulesFile = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        debug!(path = %path.display(), words = rules.lexicon.len(), "sentiment lexicon overrides loaded");
        Ok(Self::default().with_rules(rules))
    }

    fn with_rules(mut self, rules: SentimentRulesFile) -> Self {
        for (word, score) in rules.lexicon {
            self.lexicon.insert(word.to_lowercase(), score.clamp(-1.0, 1.0));
        }
        self.negators
            .extend(rules.negators.into_iter().map(|w| w.to_lowercase()));
        for (word, factor) in rules.intensifiers {
            self.intensifiers.insert(word.to_lowercase(), factor);
        }
        self
    }
}

impl SentimentAnalyzer for LexiconSentiment {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn polarity(&self, text: &str) -> f64 {
        let lowered = text.to_lowercase();
        let tokens = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let mut scores = Vec::new();
        let mut negate_until = 0usize;
        let mut intensity = 1.0f64;
        let mut intensity_until = 0usize;

        for (idx, token) in tokens.iter().enumerate() {
            if self.negators.contains(*token) || token.ends_with("n't") {
                negate_until = idx + MODIFIER_WINDOW + 1;
                continue;
            }
            if let Some(factor) = self.intensifiers.get(*token) {
                intensity = *factor;
                intensity_until = idx + MODIFIER_WINDOW + 1;
                continue;
            }
            let Some(valence) = self.lexicon.get(*token) else {
                continue;
            };
            let mut score = *valence;
            if idx < intensity_until {
                score *= intensity;
            }
            if idx < negate_until {
                score *= -0.5;
                negate_until = 0;
            }
            scores.push(score.clamp(-1.0, 1.0));
        }

        if scores.is_empty() {
            return 0.0;
        }
        (scores.iter().sum::<f64>() / scores.len() as f64).clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct StopwordRulesFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    stopwords: Vec<String>,
}

const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "again", "against", "all", "also", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each",
    "etc", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here",
    "hers", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "no", "nor", "not", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "us", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "within", "would",
    "you", "your", "yours", "able", "across", "including", "using", "well", "looking", "seeking",
    "strong", "ability", "years", "year", "experience", "work", "working", "role", "team",
];

/// Longest candidate phrase kept intact; longer runs are split.
const MAX_PHRASE_WORDS: usize = 4;

/// Near-duplicate cutoff between kept phrases (Jaro-Winkler).
const PHRASE_DEDUP_THRESHOLD: f64 = 0.93;

/// RAKE-style key phrase extraction: candidate phrases are runs of
/// non-stopwords, scored by summed word degree/frequency.
#[derive(Debug, Clone)]
pub struct RakeExtractor {
    stopwords: HashSet<String>,
}

impl Default for RakeExtractor {
    fn default() -> Self {
        Self {
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl RakeExtractor {
    pub fn from_workspace_root(root: &Path) -> Result<Self> {
        let path = root.join("rules").join("stopwords.yaml");
        let mut extractor = Self::default();
        if !path.exists() {
            return Ok(extractor);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let rules: StopwordRulesFile = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        extractor
            .stopwords
            .extend(rules.stopwords.into_iter().map(|w| w.to_lowercase()));
        Ok(extractor)
    }

    fn candidate_phrases(&self, text: &str) -> Vec<Vec<String>> {
        let mut phrases = Vec::new();
        for fragment in text.split(|c: char| ".,;:!?()[]{}|/\\\"\n\r\t".contains(c)) {
            let mut current: Vec<String> = Vec::new();
            for raw in fragment.split_whitespace() {
                let word = raw
                    .trim_matches(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
                    .to_lowercase();
                let is_break = word.is_empty()
                    || self.stopwords.contains(&word)
                    || word.chars().all(|c| c.is_ascii_digit());
                if is_break {
                    if !current.is_empty() {
                        phrases.push(std::mem::take(&mut current));
                    }
                    continue;
                }
                current.push(word);
                if current.len() == MAX_PHRASE_WORDS {
                    phrases.push(std::mem::take(&mut current));
                }
            }
            if !current.is_empty() {
                phrases.push(current);
            }
        }
        phrases
    }
}

impl KeywordExtractor for RakeExtractor {
    fn name(&self) -> &str {
        "rake"
    }

    fn extract(&self, text: &str, top_n: usize) -> Vec<String> {
        if top_n == 0 {
            return Vec::new();
        }
        let phrases = self.candidate_phrases(text);

        let mut frequency: HashMap<&str, f64> = HashMap::new();
        let mut degree: HashMap<&str, f64> = HashMap::new();
        for phrase in &phrases {
            for word in phrase {
                *frequency.entry(word.as_str()).or_default() += 1.0;
                *degree.entry(word.as_str()).or_default() += phrase.len() as f64;
            }
        }

        // (score, first position, phrase text); positions keep ties stable.
        let mut scored: Vec<(f64, usize, String)> = Vec::new();
        let mut seen = HashSet::new();
        for (position, phrase) in phrases.iter().enumerate() {
            let joined = phrase.join(" ");
            if !seen.insert(joined.clone()) {
                continue;
            }
            let score = phrase
                .iter()
                .map(|w| degree[w.as_str()] / frequency[w.as_str()])
                .sum::<f64>();
            scored.push((score, position, joined));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut kept: Vec<String> = Vec::new();
        for (_, _, phrase) in scored {
            if kept
                .iter()
                .any(|k| jaro_winkler(k, &phrase) >= PHRASE_DEDUP_THRESHOLD)
            {
                continue;
            }
            kept.push(phrase);
            if kept.len() == top_n {
                break;
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let a = vec![0.6, 0.8, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_keeps_sign() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_handles_zero_and_mismatched_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(256);
        let a = embedder.embed("Excellent technical depth").unwrap();
        let b = embedder.embed("Excellent technical depth").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hash_embedder_ranks_related_text_higher() {
        let embedder = HashEmbedder::default();
        let base = embedder.embed("excellent technical depth in distributed systems").unwrap();
        let near = embedder.embed("excellent technical depth on distributed systems").unwrap();
        let far = embedder.embed("friendly and punctual retail associate").unwrap();
        assert!(cosine_similarity(&base, &near) > cosine_similarity(&base, &far));
        assert!(cosine_similarity(&base, &near) > 0.7);
    }

    #[test]
    fn hash_embedder_of_empty_text_is_zero_vector() {
        let v = HashEmbedder::new(32).embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn embed_batch_matches_single_calls() {
        let embedder = HashEmbedder::new(64);
        let batch = embedder.embed_batch(&["hello world", "rust services"]).unwrap();
        assert_eq!(batch[1], embedder.embed("rust services").unwrap());
    }

    #[test]
    fn embedder_factory_resolves_names() {
        assert_eq!(embedder_for_name("hash", 128).unwrap().dimension(), 128);
        assert_eq!(embedder_for_name(" HASH ", 64).unwrap().name(), "hash-fnv1a");
        assert!(matches!(
            embedder_for_name("word2vec", 128),
            Err(SignalError::UnknownEmbedder(_))
        ));
    }

    #[cfg(not(feature = "fastembed"))]
    #[test]
    fn sentence_model_needs_the_fastembed_feature() {
        assert!(matches!(
            embedder_for_name("", 128),
            Err(SignalError::FeatureDisabled(name)) if name == DEFAULT_EMBEDDER
        ));
    }

    #[cfg(feature = "fastembed")]
    #[test]
    #[ignore = "downloads the all-MiniLM-L6-v2 model"]
    fn sentence_model_scores_paraphrases_above_hashing() {
        let model = embedder_for_name("", DEFAULT_EMBEDDING_DIM).unwrap();
        assert_eq!(model.name(), "all-MiniLM-L6-v2");
        assert_eq!(model.dimension(), DEFAULT_EMBEDDING_DIM);

        let hash = HashEmbedder::new(DEFAULT_EMBEDDING_DIM);
        let (a, b) = ("Excellent technical depth", "Outstanding engineering expertise");
        let lexical = cosine_similarity(&hash.embed(a).unwrap(), &hash.embed(b).unwrap());
        let semantic = cosine_similarity(&model.embed(a).unwrap(), &model.embed(b).unwrap());
        assert!(semantic > lexical + 0.2, "semantic={semantic} lexical={lexical}");
    }

    #[test]
    fn sentiment_polarity_tracks_valence() {
        let s = LexiconSentiment::default();
        assert!(s.polarity("Excellent communicator with great system design skills") > 0.2);
        assert!(s.polarity("Weak fundamentals and poor communication") < 0.0);
        assert_eq!(s.polarity("Discussed the project timeline"), 0.0);
        assert_eq!(s.polarity(""), 0.0);
    }

    #[test]
    fn sentiment_negation_flips_and_damps() {
        let s = LexiconSentiment::default();
        let plain = s.polarity("good answers");
        let negated = s.polarity("not good answers");
        assert!(plain > 0.0);
        assert!(negated < 0.0);
        assert!(negated.abs() < plain);
    }

    #[test]
    fn sentiment_intensifier_scales_within_bounds() {
        let s = LexiconSentiment::default();
        assert!(s.polarity("very good") > s.polarity("good"));
        assert!(s.polarity("extremely excellent") <= 1.0);
    }

    #[test]
    fn sentiment_rules_file_overrides_lexicon() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("rules")).unwrap();
        std::fs::write(
            dir.path().join("rules/sentiment.yaml"),
            "version: 1\nlexicon:\n  scrappy: 0.9\n  good: -0.2\n",
        )
        .unwrap();
        let s = LexiconSentiment::from_workspace_root(dir.path()).unwrap();
        assert!(s.polarity("scrappy") > 0.8);
        assert!(s.polarity("good") < 0.0);
    }

    #[test]
    fn missing_rules_files_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let signals =
            Signals::from_workspace_root(dir.path(), Box::new(HashEmbedder::new(16))).unwrap();
        assert_eq!(signals.sentiment.name(), "lexicon");
        assert_eq!(signals.keywords.name(), "rake");
    }

    #[test]
    fn malformed_rules_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("rules")).unwrap();
        std::fs::write(dir.path().join("rules/stopwords.yaml"), "stopwords: [unclosed").unwrap();
        assert!(RakeExtractor::from_workspace_root(dir.path()).is_err());
    }

    #[test]
    fn rake_prefers_multiword_phrases() {
        let rake = RakeExtractor::default();
        let phrases = rake.extract(
            "Built distributed payment systems in Rust. Led the migration to Kubernetes and mentored engineers.",
            3,
        );
        assert_eq!(phrases.len(), 3);
        assert_eq!(phrases[0], "built distributed payment systems");
        assert!(phrases.iter().all(|p| !p.split(' ').any(|w| w == "the" || w == "and")));
    }

    #[test]
    fn rake_drops_near_duplicate_phrases() {
        let rake = RakeExtractor::default();
        let phrases = rake.extract("Data pipelines. Data pipeline. Cloud cost tuning.", 5);
        assert_eq!(phrases.len(), 2);
    }

    #[test]
    fn rake_handles_empty_and_zero_requests() {
        let rake = RakeExtractor::default();
        assert!(rake.extract("", 5).is_empty());
        assert!(rake.extract("Rust services", 0).is_empty());
    }
}
