//! 에러 타입: 도메인별 에러 정의

/// strata 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캔 처리 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanFailure),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스캔 처리 에러
///
/// 스캔 엔진에서 올라오는 에러를 프로세스 경계에서 표현합니다.
/// 추출기 단위의 실패는 엔진 내부에서 흡수되므로 여기까지 올라오는 경우는 드뭅니다.
#[derive(Debug, thiserror::Error)]
pub enum ScanFailure {
    /// 스캔 루트 디렉토리를 읽을 수 없음
    #[error("root directory unreadable: {0}")]
    RootUnreadable(String),

    /// 추출기 실행 실패
    #[error("extractor failed: {0}")]
    ExtractorFailed(String),

    /// 보고서 생성 실패
    #[error("report failed: {0}")]
    ReportFailed(String),

    /// 레이어 스캔 태스크 중단
    #[error("scan task interrupted: {0}")]
    Interrupted(String),
}
