//! strata.toml 통합 설정 테스트
//!
//! - strata.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use serial_test::serial;
use strata_core::config::StrataConfig;
use strata_core::error::{ConfigError, StrataError};

const EXAMPLE: &str = include_str!("../../../strata.toml.example");

#[test]
fn example_config_parses_successfully() {
    let config = StrataConfig::parse(EXAMPLE).expect("example config should parse");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
}

#[test]
fn example_config_passes_validation() {
    let config = StrataConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let config = StrataConfig::parse(EXAMPLE).expect("should parse");
    let defaults = StrataConfig::default();

    assert_eq!(config.scan.analyze_binaries, defaults.scan.analyze_binaries);
    assert_eq!(config.scan.accurate, defaults.scan.accurate);
    assert_eq!(
        config.scan.max_concurrent_layers,
        defaults.scan.max_concurrent_layers
    );
    assert_eq!(config.scan.max_binary_size, defaults.scan.max_binary_size);
    assert_eq!(
        config.scan.max_manifest_size,
        defaults.scan.max_manifest_size
    );
    assert_eq!(
        config.scan.min_string_length,
        defaults.scan.min_string_length
    );
    assert!(config.scan.extra_excludes.is_empty());
    assert_eq!(config.output.dir, defaults.output.dir);
    assert_eq!(config.output.spdx, defaults.output.spdx);
}

#[test]
fn partial_config_only_output_section() {
    let config =
        StrataConfig::parse("[output]\ncsv = true\ndir = \"out\"\n").expect("should parse");
    assert!(config.output.csv);
    assert_eq!(config.output.dir, "out");
    assert_eq!(config.scan.max_concurrent_layers, 4);
}

#[test]
fn unknown_section_is_ignored() {
    let config = StrataConfig::parse("[future]\nkey = 1\n").expect("should parse");
    config.validate().expect("defaults should validate");
}

#[test]
fn wrong_type_fails_to_parse() {
    let err = StrataConfig::parse("[scan]\naccurate = \"yes\"\n").unwrap_err();
    assert!(matches!(
        err,
        StrataError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
#[serial]
async fn env_override_takes_precedence_over_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("strata.toml");
    std::fs::write(&path, "[scan]\nanalyze_binaries = false\n").expect("write");

    // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
    unsafe { std::env::set_var("STRATA_SCAN_ANALYZE_BINARIES", "true") };
    let result = StrataConfig::load(&path).await;
    unsafe { std::env::remove_var("STRATA_SCAN_ANALYZE_BINARIES") };

    let config = result.expect("should load");
    assert!(config.scan.analyze_binaries);
}

#[tokio::test]
#[serial]
async fn env_override_that_breaks_validation_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("strata.toml");
    std::fs::write(&path, "").expect("write");

    // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
    unsafe { std::env::set_var("STRATA_SCAN_MAX_CONCURRENT_LAYERS", "0") };
    let result = StrataConfig::load(&path).await;
    unsafe { std::env::remove_var("STRATA_SCAN_MAX_CONCURRENT_LAYERS") };

    assert!(result.is_err());
}

#[tokio::test]
async fn empty_file_loads_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("strata.toml");
    std::fs::write(&path, "").expect("write");

    let config = StrataConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.general.log_level, "info");
}
