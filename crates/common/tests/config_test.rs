use diagram_common::config::SystemConfig;
use diagram_common::DiagramError;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_load_from_toml() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("test_config.toml");

    let config_content = r#"
[server]
host = "0.0.0.0"
port = 9000

[llm]
api_base = "https://api.openai.com/v1"
model = "gpt-4o-mini"
temperature = 0.1
request_timeout_secs = 30

[repair]
max_fix_attempts = 40
validation_timeout_ms = 2500
inconclusive_is_failure = true
"#;

    fs::write(&config_path, config_content).unwrap();

    let config = SystemConfig::load_config(&config_path).unwrap();

    assert_eq!(config.server.bind_address(), "0.0.0.0:9000");
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert_eq!(config.llm.request_timeout(), Duration::from_secs(30));
    assert_eq!(config.repair.max_fix_attempts, 40);
    assert_eq!(config.repair.validation_timeout(), Duration::from_millis(2500));
    assert!(config.repair.inconclusive_is_failure);
}

#[test]
fn test_config_defaults_for_missing_sections() {
    let config = SystemConfig::from_toml_str("[llm]\nmodel = \"llama3.1\"\n").unwrap();

    assert_eq!(config.llm.model, "llama3.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.repair.max_fix_attempts, 20);
    assert_eq!(config.repair.validation_timeout(), Duration::from_secs(5));
    assert!(!config.repair.inconclusive_is_failure);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = SystemConfig::load_config(temp_dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.llm.api_base, "http://localhost:11434/v1");
}

#[test]
fn test_config_validation_zero_validation_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("invalid_config.toml");

    fs::write(&config_path, "[repair]\nvalidation_timeout_ms = 0\n").unwrap();

    let result = SystemConfig::load_config(&config_path);
    assert!(matches!(result, Err(DiagramError::ConfigValidation { .. })));
}

#[test]
fn test_config_validation_empty_model() {
    let config = SystemConfig::from_toml_str("[llm]\nmodel = \"  \"\n").unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_toml_is_reported() {
    let result = SystemConfig::from_toml_str("[repair\nmax_fix_attempts = 3");
    assert!(matches!(result, Err(DiagramError::Toml(_))));
}
