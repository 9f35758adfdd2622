use super::*;
use tempfile::TempDir;

#[test]
fn default_config_validates() {
    Config::default().validate().expect("defaults are valid");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let config = Config::load(dir.path()).expect("load defaults");

    assert_eq!(config, {
        let mut expected = Config::default();
        expected.base_dir = dir.path().to_path_buf();
        expected
    });
}

#[test]
fn save_and_reload_round_trips() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = Config::default();
    config.base_dir = dir.path().to_path_buf();
    config.embedding.backend = EmbeddingBackend::Local;
    config.embedding.dimension = 256;
    config.retrieval.top_k = 10;

    config.save().expect("save");
    let reloaded = Config::load(dir.path()).expect("reload");

    assert_eq!(reloaded.embedding.backend, EmbeddingBackend::Local);
    assert_eq!(reloaded.embedding.dimension, 256);
    assert_eq!(reloaded.retrieval.top_k, 10);
}

#[test]
fn rejects_zero_port() {
    let mut config = Config::default();
    config.ollama.port = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidPort(0))));
}

#[test]
fn rejects_bad_protocol() {
    let mut config = Config::default();
    config.ollama.protocol = "ftp".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidProtocol(_))));
}

#[test]
fn rejects_out_of_range_dimension() {
    let mut config = Config::default();
    config.embedding.dimension = 8;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(8))
    ));
}

#[test]
fn rejects_overlap_not_smaller_than_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 200;
    config.chunking.overlap = 200;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidOverlap(200, 200))
    ));
}

#[test]
fn rejects_similarity_floor_above_one() {
    let mut config = Config::default();
    config.retrieval.similarity_floor = 1.5;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidSimilarityFloor(_))
    ));
}

#[test]
fn disabled_generation_skips_generation_checks() {
    let mut config = Config::default();
    config.generation.enabled = false;
    config.generation.model = String::new();
    config.validate().expect("generation checks skipped");
}

#[test]
fn base_url_is_well_formed() {
    let ollama = OllamaConfig::default();
    let url = ollama.base_url().expect("valid url");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn database_path_prefers_override() {
    let mut config = Config::default();
    config.base_dir = PathBuf::from("/tmp/docqa-test");
    assert_eq!(config.database_path(), PathBuf::from("/tmp/docqa-test/docqa.db"));

    config.store.database_path = Some(PathBuf::from("/elsewhere/vectors.db"));
    assert_eq!(config.database_path(), PathBuf::from("/elsewhere/vectors.db"));
}
