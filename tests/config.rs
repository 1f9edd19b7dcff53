//! Engine configuration: defaults, TOML persistence, validation, overrides.

use tempfile::NamedTempFile;

use narrative_state::index::IndexKind;
use narrative_state::types::{ErrorKind, StateError, DEFAULT_DIMENSION};
use narrative_state::{EngineConfig, HashEmbedding, NarrativeEngine};

// ==================== Defaults ====================

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.dimension, DEFAULT_DIMENSION);
    assert_eq!(config.embedding.provider, "hash");
    assert_eq!(config.retrieval.candidate_multiplier, 4);
    assert_eq!(config.retrieval.min_candidates, 20);
    assert_eq!(config.index_kind().unwrap(), IndexKind::Flat);
    config.validate().unwrap();
}

#[test]
fn test_candidate_count() {
    let config = EngineConfig::default();
    assert_eq!(config.candidate_count(1), 20);
    assert_eq!(config.candidate_count(5), 20);
    assert_eq!(config.candidate_count(10), 40);
    assert_eq!(config.candidate_count(usize::MAX), usize::MAX);
}

// ==================== Persistence ====================

#[test]
fn test_toml_roundtrip() {
    let tmp = NamedTempFile::new().unwrap();
    let mut config = EngineConfig::with_dimension(32);
    config.index.kind = "cluster".into();
    config.index.probes = 8;
    config.retrieval.memory_limit = 7;
    config.save(tmp.path()).unwrap();

    let loaded = EngineConfig::load(tmp.path()).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.index_kind().unwrap(),
        IndexKind::Cluster {
            probes: 8,
            max_iterations: 10
        }
    );
}

#[test]
fn test_partial_toml_uses_defaults() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(
        tmp.path(),
        "dimension = 64\n\n[embedding]\ndimension = 64\n\n[retrieval]\nfact_limit = 3\n",
    )
    .unwrap();
    let loaded = EngineConfig::load(tmp.path()).unwrap();
    assert_eq!(loaded.dimension, 64);
    assert_eq!(loaded.retrieval.fact_limit, 3);
    assert_eq!(loaded.retrieval.memory_limit, 20);
    assert_eq!(loaded.index.kind, "flat");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), "dimension = [").unwrap();
    let err = EngineConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, StateError::Config(_)));
    assert_eq!(err.kind(), ErrorKind::Format);
}

// ==================== Validation ====================

#[test]
fn test_validate_rejects_inconsistencies() {
    let mut config = EngineConfig::with_dimension(16);
    config.embedding.dimension = 8;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::with_dimension(0);
    config.embedding.dimension = 0;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.retrieval.candidate_multiplier = 0;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.index.kind = "hnsw".into();
    assert!(config.validate().is_err());
}

#[test]
fn test_engine_rejects_invalid_config() {
    let mut config = EngineConfig::with_dimension(8);
    config.index.kind = "unknown".into();
    assert!(NarrativeEngine::new(Box::new(HashEmbedding::new(8)), config).is_err());
}

// ==================== Environment ====================

#[test]
fn test_env_overrides() {
    // The only test in this binary that touches NSTATE_* variables.
    std::env::set_var("NSTATE_DIMENSION", "48");
    std::env::set_var("NSTATE_INDEX_KIND", "cluster");
    let mut config = EngineConfig::default();
    let applied = config.apply_env();

    std::env::set_var("NSTATE_CANDIDATE_MULTIPLIER", "many");
    let mut rejected = EngineConfig::default();
    let bad = rejected.apply_env();

    std::env::remove_var("NSTATE_DIMENSION");
    std::env::remove_var("NSTATE_INDEX_KIND");
    std::env::remove_var("NSTATE_CANDIDATE_MULTIPLIER");

    applied.unwrap();
    assert_eq!(config.dimension, 48);
    assert_eq!(config.embedding.dimension, 48);
    assert_eq!(config.index.kind, "cluster");
    config.validate().unwrap();
    assert!(matches!(bad, Err(StateError::Config(_))));
}
