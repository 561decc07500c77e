//! 메트릭 상수 및 설명 등록
//!
//! 스캔 엔진이 기록하는 메트릭의 이름과 설명을 한 곳에서 정의합니다.
//! 엔진은 이 상수로 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다. 레코더가 설치되지 않으면
//! 모든 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `strata_`
//! - 구성 요소: `scan_`, `ledger_`, `extractor_`, `inventory_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(strata_core::metrics::SCAN_LAYERS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 추출기 레이블 키 (dpkg, apk, python, ...)
pub const LABEL_EXTRACTOR: &str = "extractor";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 스캔 메트릭 ────────────────────────────────────────────────────

/// 스캔: 처리된 레이어 수 (counter, label: result)
pub const SCAN_LAYERS_TOTAL: &str = "strata_scan_layers_total";

/// 스캔: 레이어 하나의 스캔 소요 시간 (histogram, 초)
pub const SCAN_LAYER_DURATION_SECONDS: &str = "strata_scan_layer_duration_seconds";

/// 스캔: 정규화 후 파일 유니버스 크기 (gauge)
pub const SCAN_UNIVERSE_FILES: &str = "strata_scan_universe_files";

// ─── 원장 메트릭 ────────────────────────────────────────────────────

/// 원장: 패키지에 귀속된 파일 수 (counter)
pub const LEDGER_FILES_ATTRIBUTED_TOTAL: &str = "strata_ledger_files_attributed_total";

/// 원장: 스캔 종료 시 귀속되지 않고 남은 파일 수 (gauge)
pub const LEDGER_FILES_REMAINING: &str = "strata_ledger_files_remaining";

/// 원장: 후보 집합 밖의 파일을 주장하려다 무시된 횟수 (counter)
pub const LEDGER_REJECTED_CLAIMS_TOTAL: &str = "strata_ledger_rejected_claims_total";

// ─── 추출기 메트릭 ──────────────────────────────────────────────────

/// 추출기: 발견된 패키지 수 (counter, label: extractor)
pub const EXTRACTOR_PACKAGES_FOUND_TOTAL: &str = "strata_extractor_packages_found_total";

/// 추출기: 실패 횟수 (counter, label: extractor)
pub const EXTRACTOR_FAILURES_TOTAL: &str = "strata_extractor_failures_total";

// ─── 인벤토리 메트릭 ────────────────────────────────────────────────

/// 인벤토리: 병합된 전체 패키지 수 (gauge)
pub const INVENTORY_PACKAGES: &str = "strata_inventory_packages";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(SCAN_LAYERS_TOTAL, "Total number of layers scanned");
    describe_histogram!(
        SCAN_LAYER_DURATION_SECONDS,
        "Time to scan a single layer in seconds"
    );
    describe_gauge!(
        SCAN_UNIVERSE_FILES,
        "Number of files in the canonical universe of the last scanned layer"
    );

    describe_counter!(
        LEDGER_FILES_ATTRIBUTED_TOTAL,
        "Total number of files attributed to a package"
    );
    describe_gauge!(
        LEDGER_FILES_REMAINING,
        "Number of files left unattributed after the last scan"
    );
    describe_counter!(
        LEDGER_REJECTED_CLAIMS_TOTAL,
        "Total number of claims rejected for naming files outside the candidate set"
    );

    describe_counter!(
        EXTRACTOR_PACKAGES_FOUND_TOTAL,
        "Total number of packages reported per extractor"
    );
    describe_counter!(
        EXTRACTOR_FAILURES_TOTAL,
        "Total number of extractor runs that failed"
    );

    describe_gauge!(
        INVENTORY_PACKAGES,
        "Number of distinct packages in the merged inventory"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        SCAN_LAYERS_TOTAL,
        SCAN_LAYER_DURATION_SECONDS,
        SCAN_UNIVERSE_FILES,
        LEDGER_FILES_ATTRIBUTED_TOTAL,
        LEDGER_FILES_REMAINING,
        LEDGER_REJECTED_CLAIMS_TOTAL,
        EXTRACTOR_PACKAGES_FOUND_TOTAL,
        EXTRACTOR_FAILURES_TOTAL,
        INVENTORY_PACKAGES,
    ];

    #[test]
    fn all_metrics_start_with_strata_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("strata_"),
                "Metric '{}' does not start with 'strata_' prefix",
                name
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names: Vec<&str> = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더 없이 호출해도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_EXTRACTOR, LABEL_RESULT] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
