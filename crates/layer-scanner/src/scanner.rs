//! 스캔 오케스트레이터
//!
//! [`Scanner`]는 선언 순서의 추출기 목록을 가지고 파일시스템 하나를 스캔합니다.
//!
//! # 단일 스캔 흐름
//!
//! ```text
//! canonicalize ──▶ Ledger(remaining = universe) ──▶ OS 식별
//!      │
//!      ▼ (accurate)
//! 중복 링크 retire
//!      │
//!      ▼
//! 추출기 1 ──▶ claim_all ──▶ 추출기 2 ──▶ claim_all ──▶ ... ──▶ Ledger
//! ```
//!
//! 추출기는 순차 실행됩니다. 각 추출기는 직전까지 남은 파일만 후보로 받으므로
//! 먼저 선언된 추출기가 겹치는 파일을 가져갑니다.
//!
//! # 다중 레이어
//!
//! [`Scanner::scan_layers`]는 독립된 레이어를 `spawn_blocking`으로 동시에 스캔하고
//! 모든 태스크가 끝난 뒤 레이어 순서대로 [`LayeredInventory`]에 병합합니다.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use strata_core::metrics as m;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::canonical::{canonicalize, resolve_duplicate_links};
use crate::config::ScanConfig;
use crate::error::LayerScanError;
use crate::extractor::{CandidateScope, Extractor, default_extractors, is_elf_candidate};
use crate::inventory::LayeredInventory;
use crate::ledger::{Diagnostic, DiagnosticKind, Ledger};
use crate::os;
use crate::types::{FileSet, LayerId};

/// 스캔할 레이어 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInput {
    /// 레이어 식별자
    pub id: LayerId,
    /// 압축 해제된 레이어 루트 디렉토리
    pub root: PathBuf,
}

impl LayerInput {
    /// 식별자와 루트로 레이어 입력을 만듭니다.
    pub fn new(id: impl Into<LayerId>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }
}

/// 스캔 오케스트레이터
pub struct Scanner {
    config: ScanConfig,
    extractors: Vec<Box<dyn Extractor>>,
}

impl Scanner {
    /// 설정을 검증하고 기본 추출기 목록으로 스캐너를 만듭니다.
    ///
    /// # Errors
    ///
    /// 설정 검증 실패 시 `LayerScanError::Config`
    pub fn new(config: ScanConfig) -> Result<Self, LayerScanError> {
        config.validate()?;
        let extractors = default_extractors(&config);
        Ok(Self { config, extractors })
    }

    /// 지정한 추출기 목록으로 스캐너를 만듭니다. 목록 순서가 우선순위입니다.
    pub fn with_extractors(
        config: ScanConfig,
        extractors: Vec<Box<dyn Extractor>>,
    ) -> Result<Self, LayerScanError> {
        config.validate()?;
        Ok(Self { config, extractors })
    }

    /// 스캐너 설정
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 실행 순서의 추출기 이름
    pub fn extractor_names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// 파일시스템 하나를 스캔해 완성된 원장을 돌려줍니다.
    ///
    /// # Errors
    ///
    /// 루트 디렉토리를 읽을 수 없을 때만 `RootUnreadable`을 반환합니다.
    /// 추출기 실패는 원장 진단으로 흡수됩니다.
    pub fn scan_dir(&self, root: &Path) -> Result<Ledger, LayerScanError> {
        let universe = canonicalize(root, &self.config.excludes())?;
        gauge!(m::SCAN_UNIVERSE_FILES).set(universe.len() as f64);
        info!(root = %root.display(), files = universe.len(), "scanning filesystem");

        let mut ledger = Ledger::new(universe);
        ledger.set_os_info(os::detect(root, ledger.universe()));

        if self.config.accurate {
            let duplicates = resolve_duplicate_links(root, ledger.universe());
            let retired = ledger.retire(&duplicates);
            debug!(retired, "duplicate links removed before extraction");
        }

        let mut executables: Option<FileSet> = None;
        for extractor in &self.extractors {
            let candidates = match extractor.scope() {
                CandidateScope::Remaining => ledger.remaining().clone(),
                CandidateScope::Executables => {
                    let elf = executables
                        .get_or_insert_with(|| find_executables(root, ledger.remaining()));
                    elf.intersection(ledger.remaining()).cloned().collect()
                }
            };
            self.run_extractor(extractor.as_ref(), &candidates, root, &mut ledger);
            debug_assert!(
                ledger.partition_holds(),
                "partition broken after {}",
                extractor.name()
            );
        }

        let summary = ledger.summary();
        gauge!(m::LEDGER_FILES_REMAINING).set(summary.remaining_files as f64);
        info!(
            root = %root.display(),
            packages = summary.packages,
            attributed = summary.attributed_files,
            total = summary.total_files,
            remaining = summary.remaining_files,
            diagnostics = summary.diagnostics,
            "scan completed"
        );
        Ok(ledger)
    }

    /// 여러 레이어를 동시에 스캔하고 레이어 순서대로 병합합니다.
    ///
    /// 동시 실행 수는 `max_concurrent_layers`로 제한됩니다. `cancel`이 취소되면
    /// 아직 시작하지 않은 레이어는 실패로 기록되고, 이미 실행 중인 레이어는
    /// 끝까지 스캔되어 병합됩니다.
    pub async fn scan_layers(
        self: &Arc<Self>,
        layers: Vec<LayerInput>,
        cancel: Option<CancellationToken>,
    ) -> LayeredInventory {
        let cancel = cancel.unwrap_or_default();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_layers));
        let mut handles = Vec::with_capacity(layers.len());
        let mut failures: Vec<(LayerId, String)> = Vec::new();

        for layer in layers {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                failures.push((layer.id, "cancelled before scan started".to_owned()));
                continue;
            };

            let scanner = Arc::clone(self);
            let id = layer.id.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let start = Instant::now();
                let result = scanner.scan_dir(&layer.root);
                histogram!(m::SCAN_LAYER_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
                result
            });
            handles.push((id, handle));
        }

        let mut ledgers = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() && self.config.strict_claims => {
                    std::panic::resume_unwind(e.into_panic())
                }
                Err(e) => Err(LayerScanError::Task(e.to_string())),
            };
            match result {
                Ok(ledger) => {
                    counter!(m::SCAN_LAYERS_TOTAL, m::LABEL_RESULT => "success").increment(1);
                    ledgers.push((id, ledger));
                }
                Err(e) => {
                    counter!(m::SCAN_LAYERS_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                    warn!(layer = %id, error = %e, "layer scan failed");
                    failures.push((id, e.to_string()));
                }
            }
        }

        let mut inventory = LayeredInventory::merge(ledgers);
        for (id, reason) in failures {
            inventory.record_failure(id, reason);
        }
        info!(
            layers = inventory.layers().len(),
            failed = inventory.failures().len(),
            packages = inventory.packages().len(),
            "layers merged"
        );
        inventory
    }

    /// 추출기 하나를 실행하고 결과를 원장에 반영합니다.
    fn run_extractor(
        &self,
        extractor: &dyn Extractor,
        candidates: &FileSet,
        root: &Path,
        ledger: &mut Ledger,
    ) {
        let name = extractor.name();
        match extractor.extract(candidates, root) {
            Ok(extraction) => {
                let packages = extraction.package_count();
                let skipped = extraction.skipped.len();
                counter!(m::EXTRACTOR_PACKAGES_FOUND_TOTAL, m::LABEL_EXTRACTOR => name)
                    .increment(packages as u64);
                let outcome =
                    ledger.claim_all(name, candidates, extraction, self.config.strict_claims);
                debug!(
                    extractor = name,
                    candidates = candidates.len(),
                    packages,
                    skipped,
                    attributed = outcome.newly_attributed,
                    rejected = outcome.rejected.len(),
                    "extractor finished"
                );
            }
            Err(e) => {
                counter!(m::EXTRACTOR_FAILURES_TOTAL, m::LABEL_EXTRACTOR => name).increment(1);
                warn!(extractor = name, error = %e, "extractor failed, treating as empty");
                ledger.push_diagnostic(Diagnostic {
                    kind: DiagnosticKind::ExtractorFailed,
                    extractor: name.to_owned(),
                    path: None,
                    reason: e.to_string(),
                });
            }
        }
    }
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .field("extractors", &self.extractor_names())
            .finish()
    }
}

/// ELF 실행 파일과 공유 객체를 찾습니다.
fn find_executables(root: &Path, files: &FileSet) -> FileSet {
    let found: FileSet = files
        .iter()
        .filter(|rel| is_elf_candidate(root, rel))
        .cloned()
        .collect();
    debug!(executables = found.len(), "executables found");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Extraction;
    use crate::types::{Ecosystem, PackageIdentity};
    use std::fs;

    /// 경로 접미사가 맞는 후보를 하나의 패키지로 주장하는 테스트 추출기
    struct SuffixExtractor {
        name: &'static str,
        suffix: &'static str,
        package: &'static str,
    }

    impl Extractor for SuffixExtractor {
        fn name(&self) -> &'static str {
            self.name
        }

        fn extract(
            &self,
            candidates: &FileSet,
            _root: &Path,
        ) -> Result<Extraction, LayerScanError> {
            let mut extraction = Extraction::new();
            let files: Vec<&String> = candidates
                .iter()
                .filter(|p| p.ends_with(self.suffix))
                .collect();
            if !files.is_empty() {
                extraction.add(
                    PackageIdentity::new(self.package, Some("1.0".into()), Ecosystem::Unknown),
                    files.into_iter().cloned(),
                );
            }
            Ok(extraction)
        }
    }

    struct FailingExtractor;

    impl Extractor for FailingExtractor {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _: &FileSet, _: &Path) -> Result<Extraction, LayerScanError> {
            Err(LayerScanError::ExtractorFailed {
                extractor: "failing".to_owned(),
                reason: "tool missing".to_owned(),
            })
        }
    }

    fn tree(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for rel in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, rel.as_bytes()).unwrap();
        }
        dir
    }

    fn suffix(
        name: &'static str,
        suffix: &'static str,
        package: &'static str,
    ) -> Box<dyn Extractor> {
        Box::new(SuffixExtractor {
            name,
            suffix,
            package,
        })
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = ScanConfig {
            max_concurrent_layers: 0,
            ..ScanConfig::default()
        };
        assert!(Scanner::new(config).is_err());
    }

    #[test]
    fn default_scanner_lists_extractors_in_order() {
        let scanner = Scanner::new(ScanConfig::default()).unwrap();
        let names = scanner.extractor_names();
        assert_eq!(names.first(), Some(&"go-binary"));
        assert_eq!(names.last(), Some(&"pkg-config"));
    }

    #[test]
    fn earlier_extractor_wins_overlap() {
        let dir = tree(&["lib/shared.txt", "lib/other.txt"]);
        let scanner = Scanner::with_extractors(
            ScanConfig::default(),
            vec![
                suffix("first", "shared.txt", "first-pkg"),
                suffix("second", ".txt", "second-pkg"),
            ],
        )
        .unwrap();

        let ledger = scanner.scan_dir(dir.path()).unwrap();
        let owners = ledger.owners_of("lib/shared.txt").unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(
            owners.iter().next().map(|p| p.name.as_str()),
            Some("first-pkg")
        );
        let second = ledger.owners_of("lib/other.txt").unwrap();
        assert_eq!(
            second.iter().next().map(|p| p.name.as_str()),
            Some("second-pkg")
        );
        assert!(ledger.remaining().is_empty());
    }

    #[test]
    fn failing_extractor_is_absorbed() {
        let dir = tree(&["app/main.txt"]);
        let scanner = Scanner::with_extractors(
            ScanConfig::default(),
            vec![Box::new(FailingExtractor), suffix("txt", ".txt", "app")],
        )
        .unwrap();

        let ledger = scanner.scan_dir(dir.path()).unwrap();
        assert_eq!(ledger.summary().packages, 1);
        assert!(
            ledger
                .diagnostics()
                .iter()
                .any(|d| d.kind == DiagnosticKind::ExtractorFailed && d.extractor == "failing")
        );
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let scanner = Scanner::with_extractors(ScanConfig::default(), Vec::new()).unwrap();
        let err = scanner
            .scan_dir(Path::new("/nonexistent/strata/root"))
            .unwrap_err();
        assert!(matches!(err, LayerScanError::RootUnreadable { .. }));
    }

    #[test]
    fn os_info_is_recorded_without_attribution() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(
            dir.path().join("etc/os-release"),
            "NAME=\"Alpine Linux\"\nVERSION_ID=3.19.1\n",
        )
        .unwrap();
        let scanner = Scanner::with_extractors(ScanConfig::default(), Vec::new()).unwrap();

        let ledger = scanner.scan_dir(dir.path()).unwrap();
        assert_eq!(
            ledger.os_info().and_then(|o| o.name.as_deref()),
            Some("Alpine Linux")
        );
        assert!(ledger.remaining().contains("etc/os-release"));
        assert!(ledger.attributed().is_empty());
    }

    #[tokio::test]
    async fn scan_layers_keeps_layer_order() {
        let first = tree(&["a/one.txt"]);
        let second = tree(&["b/two.txt"]);
        let config = ScanConfig {
            max_concurrent_layers: 1,
            ..ScanConfig::default()
        };
        let scanner = Arc::new(
            Scanner::with_extractors(config, vec![suffix("txt", ".txt", "pkg")]).unwrap(),
        );

        let inventory = scanner
            .scan_layers(
                vec![
                    LayerInput::new("first", first.path()),
                    LayerInput::new("missing", "/nonexistent/strata/layer"),
                    LayerInput::new("second", second.path()),
                ],
                None,
            )
            .await;

        let ids: Vec<&str> = inventory.layers().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(inventory.failures().len(), 1);
        assert_eq!(inventory.failures()[0].layer, "missing");
        assert_eq!(inventory.packages().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_feeding_layers() {
        let layer = tree(&["a/one.txt"]);
        let scanner =
            Arc::new(Scanner::with_extractors(ScanConfig::default(), Vec::new()).unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let inventory = scanner
            .scan_layers(vec![LayerInput::new("l1", layer.path())], Some(cancel))
            .await;
        assert!(inventory.layers().is_empty());
        assert_eq!(inventory.failures().len(), 1);
    }
}
