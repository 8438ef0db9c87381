//! API shape tests — the JSON field names clients of the embedding routes
//! rely on, checked against the serialized service types.

use std::time::Duration;

use ragwell_core::ScoreWeights;
use ragwell_infer::{
    BatchEmbedding, BenchmarkOutcome, BenchmarkReport, BenchmarkResult, EmbeddingCache,
    EmbeddingResult, ModelBenchmark, ModelRegistry,
};

/// Model entries are flat: descriptor and runtime state side by side.
#[test]
fn test_model_info_shape() {
    let registry = ModelRegistry::with_default_catalogue();
    let info = serde_json::to_value(registry.get("all-minilm-l6-v2").unwrap()).unwrap();

    assert!(info["key"].is_string());
    assert!(info["name"].is_string());
    assert!(info["description"].is_string());
    assert!(info["dimensions"].is_number());
    assert!(info["declared_size"].is_string());
    assert!(info["max_sequence_length"].is_number());
    assert!(info["supported_languages"].is_array());
    assert!(info["is_multilingual"].is_boolean());
    assert!(info["status"].is_string());
    assert!(info["is_active"].is_boolean());
    assert!(info["loaded"].is_boolean());
    // Unset until loaded / benchmarked
    assert!(info.get("load_time_seconds").is_none());
    assert!(info.get("performance_score").is_none());
}

#[test]
fn test_embed_response_shape() {
    let result = EmbeddingResult {
        embedding: vec![0.1, 0.2],
        model_key: "all-minilm-l6-v2".into(),
        dimensions: 2,
        cached: false,
    };
    let json = serde_json::to_value(&result).unwrap();

    assert!(json["embedding"].is_array());
    assert!(json["model_key"].is_string());
    assert!(json["dimensions"].is_number());
    assert!(json["cached"].is_boolean());
}

#[test]
fn test_batch_response_shape() {
    let batch = BatchEmbedding {
        embeddings: vec![vec![0.1], vec![0.2]],
        model_key: "all-minilm-l6-v2".into(),
        dimensions: 1,
        processing_time: 0.01,
        cached_count: 1,
    };
    let json = serde_json::to_value(&batch).unwrap();

    assert_eq!(json["embeddings"].as_array().unwrap().len(), 2);
    assert!(json["model_key"].is_string());
    assert!(json["dimensions"].is_number());
    assert!(json["processing_time"].is_number());
    assert!(json["cached_count"].is_number());
}

#[test]
fn test_benchmark_report_shape() {
    let report = BenchmarkReport {
        results: vec![
            ModelBenchmark {
                model_key: "all-minilm-l6-v2".into(),
                outcome: BenchmarkOutcome::Success(BenchmarkResult::new(
                    0.5,
                    0.2,
                    384,
                    8,
                    0,
                    &ScoreWeights::default(),
                )),
            },
            ModelBenchmark {
                model_key: "all-mpnet-base-v2".into(),
                outcome: BenchmarkOutcome::Failed {
                    error: "Failed to load model all-mpnet-base-v2: oom".into(),
                },
            },
        ],
        text_count: 8,
        started_at: chrono::Utc::now(),
    };
    let json = serde_json::to_value(&report).unwrap();

    assert!(json["results"].is_array());
    assert!(json["text_count"].is_number());
    assert!(json["started_at"].is_string());

    let ok = &json["results"][0];
    assert_eq!(ok["status"], "success");
    assert!(ok["load_time_seconds"].is_number());
    assert!(ok["embedding_time_seconds"].is_number());
    assert!(ok["avg_time_per_text"].is_number());
    assert!(ok["throughput"].is_number());
    assert!(ok["performance_score"].is_number());
    assert_eq!(ok["sample_count"], 8);

    let failed = &json["results"][1];
    assert_eq!(failed["status"], "failed");
    assert!(failed["error"].is_string());
    assert!(failed.get("throughput").is_none());
}

#[test]
fn test_cache_stats_shape() {
    let cache = EmbeddingCache::new(1000, Duration::from_secs(3600));
    let json = serde_json::to_value(cache.stats()).unwrap();

    assert_eq!(json["size"], 0);
    assert_eq!(json["max_size"], 1000);
    assert_eq!(json["ttl_seconds"], 3600);
    assert!(json["hits"].is_number());
    assert!(json["misses"].is_number());
}
