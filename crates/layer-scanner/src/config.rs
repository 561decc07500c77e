//! 스캔 엔진 설정
//!
//! [`ScanConfig`]는 core의 [`ScanSection`](strata_core::config::ScanSection)에서
//! 파생되며, 엔진 고유 설정(후보 주장 검사, rpm 실행 파일 경로)을 추가합니다.
//!
//! # 사용 예시
//!
//! ```
//! use strata_layer_scanner::{ScanConfig, ScanConfigBuilder};
//!
//! let config = ScanConfig::default();
//! config.validate().unwrap();
//!
//! let config = ScanConfigBuilder::new()
//!     .accurate(true)
//!     .max_concurrent_layers(8)
//!     .build()
//!     .unwrap();
//! assert!(config.accurate);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LayerScanError;

/// 기본 제외 경로 부분 문자열 (CA 번들, 타임존 데이터, 기본 웹서버 설정)
pub const DEFAULT_EXCLUDES: &[&str] = &["etc/ssl/certs/", "usr/share/zoneinfo", "etc/nginx/"];

/// 설정 상한값 상수
const MAX_CONCURRENT_LAYERS: usize = 256;
const MAX_BINARY_SIZE: u64 = 2 * 1024 * 1024 * 1024; // 2 GiB
const MAX_MANIFEST_SIZE: u64 = 512 * 1024 * 1024; // 512 MiB

/// 스캔 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 문자열 기반 바이너리 버전 탐지 (opt-in)
    pub analyze_binaries: bool,
    /// 심볼릭 링크 중복 제거
    pub accurate: bool,
    /// 동시에 스캔할 최대 레이어 수
    pub max_concurrent_layers: usize,
    /// 바이너리 분석 대상 최대 크기 (바이트)
    pub max_binary_size: u64,
    /// 매니페스트/DB 파일 최대 크기 (바이트)
    pub max_manifest_size: u64,
    /// 바이너리 문자열 최소 길이
    pub min_string_length: usize,
    /// 기본 제외 목록에 추가할 경로 부분 문자열
    pub extra_excludes: Vec<String>,

    // --- 엔진 고유 확장 ---
    /// 후보 밖 파일을 주장한 추출기를 결함으로 보고 패닉할지 여부
    pub strict_claims: bool,
    /// rpm 실행 파일
    pub rpm_command: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            analyze_binaries: false,
            accurate: false,
            max_concurrent_layers: 4,
            max_binary_size: 256 * 1024 * 1024,
            max_manifest_size: 64 * 1024 * 1024,
            min_string_length: 4,
            extra_excludes: Vec::new(),
            strict_claims: cfg!(debug_assertions),
            rpm_command: "rpm".to_owned(),
        }
    }
}

impl ScanConfig {
    /// core의 `ScanSection`에서 엔진 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값을 사용합니다.
    pub fn from_core(core: &strata_core::config::ScanSection) -> Self {
        Self {
            analyze_binaries: core.analyze_binaries,
            accurate: core.accurate,
            max_concurrent_layers: core.max_concurrent_layers,
            max_binary_size: core.max_binary_size,
            max_manifest_size: core.max_manifest_size,
            min_string_length: core.min_string_length,
            extra_excludes: core.extra_excludes.clone(),
            ..Self::default()
        }
    }

    /// 기본 제외 목록과 추가 제외 목록을 합친 전체 제외 목록
    pub fn excludes(&self) -> Vec<String> {
        DEFAULT_EXCLUDES
            .iter()
            .map(|s| (*s).to_owned())
            .chain(self.extra_excludes.iter().cloned())
            .collect()
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `max_concurrent_layers`: 1-256
    /// - `max_binary_size`: 1-2GiB
    /// - `max_manifest_size`: 1-512MiB
    /// - `min_string_length`: 2-64
    /// - `extra_excludes`: 빈 패턴 금지
    /// - `rpm_command`: 비어 있으면 안 됨
    pub fn validate(&self) -> Result<(), LayerScanError> {
        if self.max_concurrent_layers == 0 || self.max_concurrent_layers > MAX_CONCURRENT_LAYERS {
            return Err(LayerScanError::Config {
                field: "max_concurrent_layers".to_owned(),
                reason: format!("must be 1-{MAX_CONCURRENT_LAYERS}"),
            });
        }

        if self.max_binary_size == 0 || self.max_binary_size > MAX_BINARY_SIZE {
            return Err(LayerScanError::Config {
                field: "max_binary_size".to_owned(),
                reason: format!("must be 1-{MAX_BINARY_SIZE}"),
            });
        }

        if self.max_manifest_size == 0 || self.max_manifest_size > MAX_MANIFEST_SIZE {
            return Err(LayerScanError::Config {
                field: "max_manifest_size".to_owned(),
                reason: format!("must be 1-{MAX_MANIFEST_SIZE}"),
            });
        }

        if !(2..=64).contains(&self.min_string_length) {
            return Err(LayerScanError::Config {
                field: "min_string_length".to_owned(),
                reason: "must be 2-64".to_owned(),
            });
        }

        if self.extra_excludes.iter().any(|e| e.is_empty()) {
            return Err(LayerScanError::Config {
                field: "extra_excludes".to_owned(),
                reason: "exclude pattern must not be empty".to_owned(),
            });
        }

        if self.rpm_command.is_empty() {
            return Err(LayerScanError::Config {
                field: "rpm_command".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

/// [`ScanConfig`] 빌더
#[derive(Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 바이너리 문자열 분석 여부를 설정합니다.
    pub fn analyze_binaries(mut self, enabled: bool) -> Self {
        self.config.analyze_binaries = enabled;
        self
    }

    /// 심볼릭 링크 중복 제거 여부를 설정합니다.
    pub fn accurate(mut self, enabled: bool) -> Self {
        self.config.accurate = enabled;
        self
    }

    /// 동시 레이어 스캔 수를 설정합니다.
    pub fn max_concurrent_layers(mut self, n: usize) -> Self {
        self.config.max_concurrent_layers = n;
        self
    }

    /// 바이너리 최대 크기를 설정합니다.
    pub fn max_binary_size(mut self, size: u64) -> Self {
        self.config.max_binary_size = size;
        self
    }

    /// 매니페스트 최대 크기를 설정합니다.
    pub fn max_manifest_size(mut self, size: u64) -> Self {
        self.config.max_manifest_size = size;
        self
    }

    /// 바이너리 문자열 최소 길이를 설정합니다.
    pub fn min_string_length(mut self, len: usize) -> Self {
        self.config.min_string_length = len;
        self
    }

    /// 추가 제외 패턴을 설정합니다.
    pub fn extra_excludes(mut self, excludes: Vec<String>) -> Self {
        self.config.extra_excludes = excludes;
        self
    }

    /// 후보 밖 주장 시 패닉 여부를 설정합니다.
    pub fn strict_claims(mut self, strict: bool) -> Self {
        self.config.strict_claims = strict;
        self
    }

    /// rpm 실행 파일을 설정합니다.
    pub fn rpm_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.rpm_command = cmd.into();
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `LayerScanError::Config` 반환
    pub fn build(self) -> Result<ScanConfig, LayerScanError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
