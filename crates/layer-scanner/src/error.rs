//! 레이어 스캐너 에러 타입
//!
//! [`LayerScanError`]는 스캔 엔진 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<LayerScanError> for StrataError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **파일 I/O**: `Io`, `FileTooBig`, `LinkUnresolved`
//! - **스캔 루트**: `RootUnreadable` (스캔 전체를 중단시키는 유일한 에러)
//! - **추출기**: `ExtractorFailed`, `Parse`
//! - **설정**: `Config`
//! - **태스크/보고서**: `Task`, `Report`

use strata_core::error::{ConfigError, ScanFailure, StrataError};

/// 레이어 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LayerScanError {
    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 스캔 루트 디렉토리를 읽을 수 없음
    #[error("root directory unreadable: {path}: {reason}")]
    RootUnreadable {
        /// 루트 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 추출기 전체 실패 (필요한 도구 없음 등)
    #[error("extractor '{extractor}' failed: {reason}")]
    ExtractorFailed {
        /// 추출기 이름
        extractor: String,
        /// 실패 사유
        reason: String,
    },

    /// 매니페스트/DB 파싱 실패
    #[error("parse error: {path}: {reason}")]
    Parse {
        /// 파싱 대상 파일 경로
        path: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 파일 크기 초과
    #[error("file too large: {path}: {size} bytes (max: {max})")]
    FileTooBig {
        /// 파일 경로
        path: String,
        /// 실제 파일 크기 (바이트)
        size: u64,
        /// 최대 허용 크기 (바이트)
        max: u64,
    },

    /// 루트 안에서 해석되지 않는 심볼릭 링크 (순환 또는 루트 밖 참조)
    #[error("link does not resolve inside the layer: {path}")]
    LinkUnresolved {
        /// 링크를 포함한 경로
        path: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 블로킹 태스크 실행 실패
    #[error("task error: {0}")]
    Task(String),

    /// 보고서 생성 실패
    #[error("report error: {0}")]
    Report(String),
}

impl LayerScanError {
    /// 경로와 I/O 에러로 `Io` 변형을 만듭니다.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 경로와 사유로 `Parse` 변형을 만듭니다.
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<LayerScanError> for StrataError {
    fn from(err: LayerScanError) -> Self {
        match err {
            LayerScanError::Io { source, .. } => StrataError::Io(source),
            LayerScanError::RootUnreadable { path, reason } => StrataError::Scan(
                ScanFailure::RootUnreadable(format!("{path}: {reason}")),
            ),
            LayerScanError::ExtractorFailed { extractor, reason } => StrataError::Scan(
                ScanFailure::ExtractorFailed(format!("{extractor}: {reason}")),
            ),
            LayerScanError::Parse { path, reason } => StrataError::Scan(
                ScanFailure::ExtractorFailed(format!("parse error: {path}: {reason}")),
            ),
            LayerScanError::FileTooBig { path, size, max } => {
                StrataError::Scan(ScanFailure::ExtractorFailed(format!(
                    "file too large: {path}: {size} bytes (max: {max})"
                )))
            }
            LayerScanError::LinkUnresolved { path } => StrataError::Scan(
                ScanFailure::ExtractorFailed(format!("link does not resolve: {path}")),
            ),
            LayerScanError::Config { field, reason } => {
                StrataError::Config(ConfigError::InvalidValue { field, reason })
            }
            LayerScanError::Task(msg) => StrataError::Scan(ScanFailure::Interrupted(msg)),
            LayerScanError::Report(msg) => StrataError::Scan(ScanFailure::ReportFailed(msg)),
        }
    }
}
