//! 귀속 원장 -- 한 번의 파일시스템 스캔 상태
//!
//! [`Ledger`]는 파일 유니버스를 `attributed`와 `remaining` 두 집합으로 분할합니다.
//! 모든 변경은 [`Ledger::claim`], [`Ledger::claim_all`], [`Ledger::retire`]를
//! 거치며, 어느 시점에서 관찰해도 다음이 성립합니다.
//!
//! - `attributed ∩ remaining = ∅`
//! - `attributed ∪ remaining = universe`
//! - `remaining`은 줄어들기만 하고 `attributed`는 늘어나기만 함
//!
//! 이미 귀속된 파일을 다시 주장하는 것은 분할 관점에서 no-op입니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use metrics::counter;
use serde::Serialize;
use strata_core::metrics as m;
use tracing::{error, warn};

use crate::types::{FileSet, OsInfo, PackageFiles, PackageIdentity};

/// 진단 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// 후보 파일 하나를 파싱하지 못해 건너뜀
    CandidateSkipped,
    /// 추출기 전체가 실패함
    ExtractorFailed,
    /// 추출기가 받은 후보 밖의 파일을 주장함
    ClaimOutsideCandidates,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CandidateSkipped => write!(f, "candidate_skipped"),
            Self::ExtractorFailed => write!(f, "extractor_failed"),
            Self::ClaimOutsideCandidates => write!(f, "claim_outside_candidates"),
        }
    }
}

/// 스캔 중 수집된 진단 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 진단 종류
    pub kind: DiagnosticKind,
    /// 진단을 낸 추출기 (오케스트레이터가 채움)
    pub extractor: String,
    /// 관련 파일 경로
    pub path: Option<String>,
    /// 사유
    pub reason: String,
}

impl Diagnostic {
    /// 후보 건너뜀 진단을 만듭니다.
    pub fn skipped(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            kind: DiagnosticKind::CandidateSkipped,
            extractor: String::new(),
            path: Some(path.into()),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.extractor)?;
        if let Some(path) = &self.path {
            write!(f, " {path}")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// 추출기 한 번 실행의 결과
///
/// 패키지별 파일 맵과 후보 단위 진단 목록을 담습니다.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// 식별된 패키지와 귀속 파일
    pub packages: PackageFiles,
    /// 건너뛴 후보
    pub skipped: Vec<Diagnostic>,
}

impl Extraction {
    /// 빈 결과를 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 패키지에 파일을 추가합니다 (기존 항목과 합집합).
    pub fn add<I, S>(&mut self, identity: PackageIdentity, files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages
            .entry(identity)
            .or_default()
            .extend(files.into_iter().map(Into::into));
    }

    /// 패키지에 파일을 추가하되 후보 집합에 있는 것만 남깁니다.
    pub fn add_within<I, S>(&mut self, identity: PackageIdentity, files: I, candidates: &FileSet)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.packages.entry(identity).or_default();
        for file in files {
            let file = file.into();
            if candidates.contains(&file) {
                entry.insert(file);
            }
        }
    }

    /// 후보 하나를 건너뛴 사실을 기록합니다.
    pub fn skip(&mut self, path: impl Into<String>, reason: impl fmt::Display) {
        self.skipped.push(Diagnostic::skipped(path, reason));
    }

    /// 다른 결과를 병합합니다.
    pub fn merge(&mut self, other: Extraction) {
        for (identity, files) in other.packages {
            self.packages.entry(identity).or_default().extend(files);
        }
        self.skipped.extend(other.skipped);
    }

    /// 발견된 패키지 수
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// 결과가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.skipped.is_empty()
    }
}

/// [`Ledger::claim_all`] 결과
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// 이번에 새로 귀속된 파일 수
    pub newly_attributed: usize,
    /// 후보 밖이라 무시된 파일
    pub rejected: Vec<String>,
}

/// 스캔 요약 수치
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// 유니버스 크기
    pub total_files: usize,
    /// 귀속된 파일 수 (링크 중복 제거분 포함)
    pub attributed_files: usize,
    /// 남은 파일 수
    pub remaining_files: usize,
    /// 식별된 패키지 수
    pub packages: usize,
    /// 진단 수
    pub diagnostics: usize,
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found {} packages. Indexed {} files over a total of {} - Remaining files {}",
            self.packages, self.attributed_files, self.total_files, self.remaining_files
        )
    }
}

/// 귀속 원장
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    universe: FileSet,
    remaining: FileSet,
    attributed: FileSet,
    retired: FileSet,
    package_files: PackageFiles,
    file_owners: BTreeMap<String, BTreeSet<PackageIdentity>>,
    os_info: Option<OsInfo>,
    diagnostics: Vec<Diagnostic>,
}

impl Ledger {
    /// 모든 파일이 `remaining`인 원장을 만듭니다.
    pub fn new(universe: FileSet) -> Self {
        Self {
            remaining: universe.clone(),
            universe,
            ..Self::default()
        }
    }

    /// 이미 완성된 패키지 맵으로 원장을 만듭니다.
    ///
    /// 빌드 이력 휴리스틱처럼 파일시스템 스캔이 아닌 출처의 의사 레이어에 씁니다.
    /// 유니버스는 맵에 등장한 파일 전체이고 모두 귀속된 상태로 시작합니다.
    pub fn synthetic(packages: PackageFiles) -> Self {
        let universe: FileSet = packages.values().flatten().cloned().collect();
        let mut ledger = Self::new(universe);
        for (identity, files) in packages {
            ledger.claim(identity, files);
        }
        ledger
    }

    /// 스캔 시작 시점의 파일 유니버스
    pub fn universe(&self) -> &FileSet {
        &self.universe
    }

    /// 아직 귀속되지 않은 파일
    pub fn remaining(&self) -> &FileSet {
        &self.remaining
    }

    /// 귀속된 파일 (중복 링크로 제거된 파일 포함)
    pub fn attributed(&self) -> &FileSet {
        &self.attributed
    }

    /// 링크 중복 제거로 소유자 없이 귀속 처리된 파일
    pub fn retired(&self) -> &FileSet {
        &self.retired
    }

    /// 패키지별 귀속 파일 맵
    pub fn package_files(&self) -> &PackageFiles {
        &self.package_files
    }

    /// 식별된 패키지 목록
    pub fn packages(&self) -> impl Iterator<Item = &PackageIdentity> {
        self.package_files.keys()
    }

    /// 패키지에 귀속된 파일
    pub fn files_of(&self, identity: &PackageIdentity) -> Option<&FileSet> {
        self.package_files.get(identity)
    }

    /// 파일을 주장한 패키지 목록
    pub fn owners_of(&self, path: &str) -> Option<&BTreeSet<PackageIdentity>> {
        self.file_owners.get(path)
    }

    /// OS 식별 정보
    pub fn os_info(&self) -> Option<&OsInfo> {
        self.os_info.as_ref()
    }

    /// OS 식별 정보를 기록합니다. 파일 분할에는 영향을 주지 않습니다.
    pub fn set_os_info(&mut self, os: Option<OsInfo>) {
        self.os_info = os;
    }

    /// 수집된 진단
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// 진단을 추가합니다.
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 단일 패키지의 파일 주장
    ///
    /// `remaining`에 있는 파일만 새로 귀속됩니다. 이미 귀속되었거나 유니버스 밖인
    /// 파일은 무시됩니다. 파일이 하나도 받아들여지지 않아도 식별자는 기록됩니다.
    /// 새로 귀속된 파일 수를 반환합니다.
    pub fn claim<I, S>(&mut self, identity: PackageIdentity, files: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accepted: FileSet = files
            .into_iter()
            .map(Into::into)
            .filter(|f| self.remaining.contains(f))
            .collect();
        self.apply(vec![(identity, accepted)])
    }

    /// 추출기 한 번의 결과를 원자적으로 반영합니다.
    ///
    /// 같은 배치 안의 모든 패키지는 배치 이전의 `remaining`을 기준으로 판정되므로
    /// 여러 패키지가 같은 파일을 함께 소유할 수 있습니다. `candidates` 밖의 파일은
    /// 결함으로 보고 `strict`이면 패닉, 아니면 무시하고 진단을 남깁니다.
    pub fn claim_all(
        &mut self,
        extractor: &str,
        candidates: &FileSet,
        extraction: Extraction,
        strict: bool,
    ) -> ClaimOutcome {
        let mut outcome = ClaimOutcome::default();
        let mut batch = Vec::with_capacity(extraction.packages.len());

        for (identity, files) in extraction.packages {
            let mut accepted = FileSet::new();
            for file in files {
                if !candidates.contains(&file) {
                    if strict {
                        panic!(
                            "extractor '{extractor}' claimed '{file}' outside its candidate set"
                        );
                    }
                    error!(extractor, path = %file, "claim outside candidate set ignored");
                    outcome.rejected.push(file);
                    continue;
                }
                if self.remaining.contains(&file) {
                    accepted.insert(file);
                }
            }
            batch.push((identity, accepted));
        }

        for path in &outcome.rejected {
            self.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::ClaimOutsideCandidates,
                extractor: extractor.to_owned(),
                path: Some(path.clone()),
                reason: "file was not in the candidate set".to_owned(),
            });
        }
        if !outcome.rejected.is_empty() {
            counter!(m::LEDGER_REJECTED_CLAIMS_TOTAL).increment(outcome.rejected.len() as u64);
        }

        for mut diagnostic in extraction.skipped {
            diagnostic.extractor = extractor.to_owned();
            warn!(
                extractor,
                path = diagnostic.path.as_deref().unwrap_or_default(),
                reason = %diagnostic.reason,
                "candidate skipped"
            );
            self.diagnostics.push(diagnostic);
        }

        outcome.newly_attributed = self.apply(batch);
        outcome
    }

    /// 파일을 소유자 없이 귀속 처리합니다 (링크 중복 제거).
    ///
    /// `remaining`에 있던 파일 수를 반환합니다.
    pub fn retire(&mut self, files: &FileSet) -> usize {
        let mut moved = 0;
        for file in files {
            if self.remaining.remove(file) {
                self.attributed.insert(file.clone());
                self.retired.insert(file.clone());
                moved += 1;
            }
        }
        moved
    }

    /// 분할 불변식 검사
    pub fn partition_holds(&self) -> bool {
        self.attributed.is_disjoint(&self.remaining)
            && self.attributed.len() + self.remaining.len() == self.universe.len()
            && self.attributed.is_subset(&self.universe)
            && self.remaining.is_subset(&self.universe)
    }

    /// 요약 수치
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            total_files: self.universe.len(),
            attributed_files: self.attributed.len(),
            remaining_files: self.remaining.len(),
            packages: self.package_files.len(),
            diagnostics: self.diagnostics.len(),
        }
    }

    /// 판정이 끝난 배치를 반영합니다.
    fn apply(&mut self, batch: Vec<(PackageIdentity, FileSet)>) -> usize {
        let mut newly = 0;
        for (identity, accepted) in batch {
            for file in &accepted {
                if self.remaining.remove(file) {
                    self.attributed.insert(file.clone());
                    newly += 1;
                }
                self.file_owners
                    .entry(file.clone())
                    .or_default()
                    .insert(identity.clone());
            }
            self.package_files
                .entry(identity)
                .or_default()
                .extend(accepted);
        }
        if newly > 0 {
            counter!(m::LEDGER_FILES_ATTRIBUTED_TOTAL).increment(newly as u64);
        }
        newly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ecosystem;

    fn set(items: &[&str]) -> FileSet {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn pkg(name: &str) -> PackageIdentity {
        PackageIdentity::new(name, Some("1.0".to_owned()), Ecosystem::Unknown)
    }

    #[test]
    fn new_ledger_has_everything_remaining() {
        let ledger = Ledger::new(set(&["bin/foo", "lib/libfoo.so"]));
        assert_eq!(ledger.remaining().len(), 2);
        assert!(ledger.attributed().is_empty());
        assert!(ledger.partition_holds());
    }

    #[test]
    fn claim_moves_files() {
        let mut ledger = Ledger::new(set(&["bin/foo", "lib/libfoo.so"]));
        let newly = ledger.claim(pkg("foo"), ["bin/foo"]);
        assert_eq!(newly, 1);
        assert_eq!(ledger.attributed(), &set(&["bin/foo"]));
        assert_eq!(ledger.remaining(), &set(&["lib/libfoo.so"]));
        assert!(ledger.partition_holds());
    }

    #[test]
    fn reclaiming_attributed_file_is_noop() {
        let mut ledger = Ledger::new(set(&["bin/foo"]));
        ledger.claim(pkg("foo"), ["bin/foo"]);
        let newly = ledger.claim(pkg("bar"), ["bin/foo"]);
        assert_eq!(newly, 0);
        assert!(ledger.files_of(&pkg("bar")).is_some_and(FileSet::is_empty));
        assert_eq!(ledger.owners_of("bin/foo").map(BTreeSet::len), Some(1));
    }

    #[test]
    fn claim_ignores_files_outside_universe() {
        let mut ledger = Ledger::new(set(&["bin/foo"]));
        ledger.claim(pkg("foo"), ["bin/ghost"]);
        assert!(ledger.attributed().is_empty());
        assert!(ledger.partition_holds());
    }

    #[test]
    fn identity_with_no_files_is_recorded() {
        let mut ledger = Ledger::new(FileSet::new());
        ledger.claim(pkg("virtual"), Vec::<String>::new());
        assert_eq!(ledger.packages().count(), 1);
    }

    #[test]
    fn later_claim_unions_files_for_same_identity() {
        let mut ledger = Ledger::new(set(&["a/one", "a/two"]));
        ledger.claim(pkg("a"), ["a/one"]);
        ledger.claim(pkg("a"), ["a/two"]);
        assert_eq!(ledger.files_of(&pkg("a")), Some(&set(&["a/one", "a/two"])));
    }

    #[test]
    fn batch_shares_files_between_packages() {
        let universe = set(&["var/lib/dpkg/status", "bin/bash"]);
        let mut ledger = Ledger::new(universe.clone());
        let mut extraction = Extraction::new();
        extraction.add(pkg("bash"), ["bin/bash", "var/lib/dpkg/status"]);
        extraction.add(pkg("base-files"), ["var/lib/dpkg/status"]);

        let outcome = ledger.claim_all("dpkg", &universe, extraction, true);
        assert_eq!(outcome.newly_attributed, 2);
        assert_eq!(
            ledger.owners_of("var/lib/dpkg/status").map(BTreeSet::len),
            Some(2)
        );
        assert!(ledger.partition_holds());
    }

    #[test]
    fn lenient_mode_ignores_out_of_candidate_claims() {
        let universe = set(&["bin/foo", "bin/bar"]);
        let candidates = set(&["bin/foo"]);
        let mut ledger = Ledger::new(universe);
        let mut extraction = Extraction::new();
        extraction.add(pkg("foo"), ["bin/foo", "bin/bar"]);

        let outcome = ledger.claim_all("rogue", &candidates, extraction, false);
        assert_eq!(outcome.rejected, vec!["bin/bar".to_owned()]);
        assert!(ledger.remaining().contains("bin/bar"));
        assert_eq!(ledger.diagnostics().len(), 1);
        assert_eq!(
            ledger.diagnostics()[0].kind,
            DiagnosticKind::ClaimOutsideCandidates
        );
    }

    #[test]
    #[should_panic(expected = "outside its candidate set")]
    fn strict_mode_panics_on_out_of_candidate_claims() {
        let mut ledger = Ledger::new(set(&["bin/foo", "bin/bar"]));
        let mut extraction = Extraction::new();
        extraction.add(pkg("foo"), ["bin/bar"]);
        ledger.claim_all("rogue", &set(&["bin/foo"]), extraction, true);
    }

    #[test]
    fn skipped_candidates_become_diagnostics() {
        let universe = set(&["a/package.json"]);
        let mut ledger = Ledger::new(universe.clone());
        let mut extraction = Extraction::new();
        extraction.skip("a/package.json", "expected value at line 1");

        ledger.claim_all("npm", &universe, extraction, true);
        let diag = &ledger.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::CandidateSkipped);
        assert_eq!(diag.extractor, "npm");
        assert!(ledger.remaining().contains("a/package.json"));
    }

    #[test]
    fn retire_keeps_partition() {
        let mut ledger = Ledger::new(set(&["bin/x", "usr/bin/x"]));
        let moved = ledger.retire(&set(&["usr/bin/x", "not/there"]));
        assert_eq!(moved, 1);
        assert!(ledger.retired().contains("usr/bin/x"));
        assert!(ledger.attributed().contains("usr/bin/x"));
        assert!(ledger.owners_of("usr/bin/x").is_none());
        assert!(ledger.partition_holds());
    }

    #[test]
    fn synthetic_ledger_is_fully_attributed() {
        let mut packages = PackageFiles::new();
        packages.insert(pkg("nginx"), set(&["Dockerfile"]));
        let ledger = Ledger::synthetic(packages);
        assert_eq!(ledger.universe().len(), 1);
        assert!(ledger.remaining().is_empty());
        assert!(ledger.partition_holds());
    }

    #[test]
    fn summary_display() {
        let mut ledger = Ledger::new(set(&["bin/foo", "lib/libfoo.so"]));
        ledger.claim(pkg("foo"), ["bin/foo"]);
        assert_eq!(
            ledger.summary().to_string(),
            "Found 1 packages. Indexed 1 files over a total of 2 - Remaining files 1"
        );
    }
}
