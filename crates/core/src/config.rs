//! 설정 관리: strata.toml 파싱 및 런타임 설정
//!
//! [`StrataConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`STRATA_SCAN_ACCURATE=true` 형식)
//! 3. 설정 파일 (`strata.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), strata_core::error::StrataError> {
//! use strata_core::config::StrataConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = StrataConfig::load("strata.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = StrataConfig::parse("[scan]\naccurate = true")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, StrataError};

/// 바이너리 크기 상한의 최대값 (2 GiB)
const MAX_BINARY_SIZE_LIMIT: u64 = 2 * 1024 * 1024 * 1024;

/// 매니페스트 크기 상한의 최대값 (512 MiB)
const MAX_MANIFEST_SIZE_LIMIT: u64 = 512 * 1024 * 1024;

/// 동시 레이어 스캔 수 상한
const MAX_CONCURRENT_LAYERS_LIMIT: usize = 256;

/// strata 통합 설정
///
/// `strata.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캔 설정
    #[serde(default)]
    pub scan: ScanSection,
    /// 출력 설정
    #[serde(default)]
    pub output: OutputConfig,
}

impl StrataConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StrataError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 경로가 주어지면 파일에서, 아니면 기본값에서 설정을 구성합니다.
    ///
    /// 어느 경우든 환경변수 오버라이드와 검증을 거칩니다.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, StrataError> {
        match path {
            Some(path) => Self::load(path).await,
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, StrataError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StrataError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                StrataError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, StrataError> {
        toml::from_str(toml_str).map_err(|e| {
            StrataError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `STRATA_{SECTION}_{FIELD}`
    /// 예: `STRATA_SCAN_ANALYZE_BINARIES=true`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "STRATA_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "STRATA_GENERAL_LOG_FORMAT");

        // Scan
        override_bool(
            &mut self.scan.analyze_binaries,
            "STRATA_SCAN_ANALYZE_BINARIES",
        );
        override_bool(&mut self.scan.accurate, "STRATA_SCAN_ACCURATE");
        override_usize(
            &mut self.scan.max_concurrent_layers,
            "STRATA_SCAN_MAX_CONCURRENT_LAYERS",
        );
        override_u64(
            &mut self.scan.max_binary_size,
            "STRATA_SCAN_MAX_BINARY_SIZE",
        );
        override_u64(
            &mut self.scan.max_manifest_size,
            "STRATA_SCAN_MAX_MANIFEST_SIZE",
        );
        override_usize(
            &mut self.scan.min_string_length,
            "STRATA_SCAN_MIN_STRING_LENGTH",
        );
        override_csv(&mut self.scan.extra_excludes, "STRATA_SCAN_EXTRA_EXCLUDES");

        // Output
        override_string(&mut self.output.dir, "STRATA_OUTPUT_DIR");
        override_bool(&mut self.output.csv, "STRATA_OUTPUT_CSV");
        override_bool(&mut self.output.json, "STRATA_OUTPUT_JSON");
        override_bool(&mut self.output.spdx, "STRATA_OUTPUT_SPDX");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), StrataError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.scan.max_concurrent_layers == 0
            || self.scan.max_concurrent_layers > MAX_CONCURRENT_LAYERS_LIMIT
        {
            return Err(ConfigError::InvalidValue {
                field: "scan.max_concurrent_layers".to_owned(),
                reason: format!("must be 1-{MAX_CONCURRENT_LAYERS_LIMIT}"),
            }
            .into());
        }

        if self.scan.max_binary_size == 0 || self.scan.max_binary_size > MAX_BINARY_SIZE_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "scan.max_binary_size".to_owned(),
                reason: format!("must be 1-{MAX_BINARY_SIZE_LIMIT}"),
            }
            .into());
        }

        if self.scan.max_manifest_size == 0
            || self.scan.max_manifest_size > MAX_MANIFEST_SIZE_LIMIT
        {
            return Err(ConfigError::InvalidValue {
                field: "scan.max_manifest_size".to_owned(),
                reason: format!("must be 1-{MAX_MANIFEST_SIZE_LIMIT}"),
            }
            .into());
        }

        if !(2..=64).contains(&self.scan.min_string_length) {
            return Err(ConfigError::InvalidValue {
                field: "scan.min_string_length".to_owned(),
                reason: "must be 2-64".to_owned(),
            }
            .into());
        }

        if self.scan.extra_excludes.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: "scan.extra_excludes".to_owned(),
                reason: "exclude patterns must not be empty".to_owned(),
            }
            .into());
        }

        if self.output.dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "output.dir".to_owned(),
                reason: "output directory must not be empty".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 스캔 설정
///
/// 스캔 엔진은 이 섹션에서 자기 설정을 파생합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// 문자열 기반 바이너리 버전 탐지 활성화 (느림)
    pub analyze_binaries: bool,
    /// 심볼릭 링크 중복 제거 활성화
    pub accurate: bool,
    /// 동시에 스캔할 최대 레이어 수
    pub max_concurrent_layers: usize,
    /// 바이너리 분석 대상 파일 최대 크기 (바이트)
    pub max_binary_size: u64,
    /// 매니페스트/DB 파일 최대 크기 (바이트)
    pub max_manifest_size: u64,
    /// 바이너리 문자열 추출 최소 길이
    pub min_string_length: usize,
    /// 기본 제외 목록에 추가할 경로 부분 문자열
    pub extra_excludes: Vec<String>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            analyze_binaries: false,
            accurate: false,
            max_concurrent_layers: 4,
            max_binary_size: 256 * 1024 * 1024, // 256 MiB
            max_manifest_size: 64 * 1024 * 1024, // 64 MiB
            min_string_length: 4,
            extra_excludes: Vec::new(),
        }
    }
}

/// 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 보고서 저장 디렉토리
    pub dir: String,
    /// CSV 패키지 목록 저장 여부
    pub csv: bool,
    /// 패키지별 파일 JSON 저장 여부
    pub json: bool,
    /// SPDX 문서 저장 여부
    pub spdx: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "results".to_owned(),
            csv: false,
            json: false,
            spdx: true,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
