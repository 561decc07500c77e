#![doc = include_str!("../README.md")]
//!
//! # 모듈 구조
//!
//! - [`error`]: 도메인 에러 (`LayerScanError`)
//! - [`config`]: 스캔 설정 (`ScanConfig`, 빌더)
//! - [`types`]: 패키지 식별자, 생태계, OS 정보
//! - [`normalize`]: 추출기 원시 값의 식별자 정규화
//! - [`canonical`]: 파일 유니버스 구성과 링크 중복 정리
//! - [`ledger`]: 귀속 원장 (`Ledger`)
//! - [`extractor`]: 생태계별 추출기 (`Extractor` trait)
//! - [`os`]: 릴리스 파일 기반 OS 식별
//! - [`scanner`]: 레이어 스캔 오케스트레이터 (`Scanner`)
//! - [`inventory`]: 다중 레이어 병합 (`LayeredInventory`)
//! - [`report`]: CSV / JSON / SPDX / 실행 요약 보고서

pub mod canonical;
pub mod config;
pub mod error;
pub mod extractor;
pub mod inventory;
pub mod ledger;
pub mod normalize;
pub mod os;
pub mod report;
pub mod scanner;
pub mod types;

// --- 주요 타입 re-export ---

// 스캐너
pub use scanner::{LayerInput, Scanner};

// 설정
pub use config::{ScanConfig, ScanConfigBuilder};

// 에러
pub use error::LayerScanError;

// 원장과 인벤토리
pub use inventory::{Attribution, LayerFailure, LayeredInventory};
pub use ledger::{ClaimOutcome, Diagnostic, DiagnosticKind, Extraction, Ledger, ScanSummary};

// 타입
pub use types::{Ecosystem, FileSet, LayerId, OsInfo, PackageFiles, PackageIdentity};

// 추출기
pub use extractor::{CandidateScope, Extractor, default_extractors};

// 보고서
pub use report::{ReportSelection, ReportWriter, RunLog};
