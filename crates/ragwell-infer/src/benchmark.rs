//! Benchmark sweep results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ragwell_core::ScoreWeights;

/// Sentences embedded when the caller supplies none.
pub const DEFAULT_BENCHMARK_TEXTS: &[&str] = &[
    "The quick brown fox jumps over the lazy dog.",
    "Machine learning models convert text into dense vector representations.",
    "Retrieval-augmented generation grounds language model answers in documents.",
    "The meeting was moved to Thursday afternoon because of the holiday.",
    "Vector databases index embeddings for fast approximate nearest neighbour search.",
    "She planted tomatoes, basil and peppers in the raised garden bed.",
    "Quarterly revenue grew by twelve percent compared to the previous year.",
    "How do I reset my password if I no longer have access to my email?",
];

/// Timing of one model's load + batch embed.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub load_time_seconds: f64,
    pub embedding_time_seconds: f64,
    pub avg_time_per_text: f64,
    /// Texts per second.
    pub throughput: f64,
    pub dimensions: usize,
    pub sample_count: usize,
    /// How many of the samples were already cached.
    pub cached_count: usize,
    pub performance_score: f64,
}

impl BenchmarkResult {
    pub fn new(
        load_time_seconds: f64,
        embedding_time_seconds: f64,
        dimensions: usize,
        sample_count: usize,
        cached_count: usize,
        weights: &ScoreWeights,
    ) -> Self {
        let count = sample_count.max(1) as f64;
        let embed_time = embedding_time_seconds.max(f64::EPSILON);
        let avg_time_per_text = embedding_time_seconds / count;
        Self {
            load_time_seconds,
            embedding_time_seconds,
            avg_time_per_text,
            throughput: count / embed_time,
            dimensions,
            sample_count,
            cached_count,
            performance_score: performance_score(avg_time_per_text, dimensions, weights),
        }
    }
}

/// `speed * min(1, 1/avg_time) + dimensionality * min(1, dims/reference)`, clamped to 0..=1.
pub fn performance_score(avg_time_per_text: f64, dimensions: usize, weights: &ScoreWeights) -> f64 {
    let speed = (1.0 / avg_time_per_text.max(f64::EPSILON)).min(1.0);
    let dims = if weights.reference_dimensions > 0.0 {
        (dimensions as f64 / weights.reference_dimensions).min(1.0)
    } else {
        0.0
    };
    (weights.speed * speed + weights.dimensionality * dims).clamp(0.0, 1.0)
}

/// Per-model benchmark outcome; failures are data, not errors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BenchmarkOutcome {
    Success(BenchmarkResult),
    Failed { error: String },
}

impl BenchmarkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelBenchmark {
    pub model_key: String,
    #[serde(flatten)]
    pub outcome: BenchmarkOutcome,
}

/// Results of a benchmark sweep, in the order models were run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub results: Vec<ModelBenchmark>,
    pub text_count: usize,
    pub started_at: DateTime<Utc>,
}

impl BenchmarkReport {
    pub fn get(&self, model_key: &str) -> Option<&BenchmarkOutcome> {
        self.results
            .iter()
            .find(|r| r.model_key == model_key)
            .map(|r| &r.outcome)
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }
}
