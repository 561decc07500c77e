//! RPM 데이터베이스 추출기
//!
//! rpmdb 디렉토리(`rpm/Packages`, `Packages.db`, `rpmdb.sqlite`)를 찾아
//! `rpm --dbpath <dir> -qa --queryformat ...`로 조회합니다.
//! `rpm` 실행 파일이 없으면 추출기 전체 실패입니다.
//!
//! # 조회 출력 형식
//!
//! ```text
//! @@<TAB>name<TAB>epoch<TAB>version<TAB>release<TAB>arch<TAB>vendor
//! /usr/bin/bash
//! /usr/share/doc/bash/README
//! ```

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::LayerScanError;
use crate::extractor::{Extractor, confined_path, files_under, parent_dir};
use crate::ledger::Extraction;
use crate::normalize::RawPackage;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

const QUERY_FORMAT: &str =
    "@@\t%{NAME}\t%{EPOCH}\t%{VERSION}\t%{RELEASE}\t%{ARCH}\t%{VENDOR}\n[%{FILENAMES}\n]";
const HEADER_PREFIX: &str = "@@\t";
const NONE: &str = "(none)";

/// yum/dnf 메타데이터 경로 (모든 rpm 패키지가 공유)
const YUM_PATHS: &[&str] = &["var/lib/yum", "var/cache/yum/", "etc/yum.repos.d/", "var/log/yum"];

/// RPM 추출기
pub struct RpmExtractor {
    rpm_command: String,
}

/// 조회 결과의 패키지 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpmPackage {
    /// 식별자
    pub identity: PackageIdentity,
    /// 설치 파일 (루트 기준 상대 경로)
    pub files: Vec<String>,
}

impl RpmExtractor {
    /// rpm 실행 파일 경로로 추출기를 생성합니다.
    pub fn new(rpm_command: impl Into<String>) -> Self {
        Self {
            rpm_command: rpm_command.into(),
        }
    }

    fn query(&self, root: &Path, db_dir: &str) -> Result<String, LayerScanError> {
        let db_path = confined_path(root, db_dir)?;
        let output = Command::new(&self.rpm_command)
            .arg("--dbpath")
            .arg(db_path)
            .args(["-qa", "--queryformat", QUERY_FORMAT])
            .output()
            .map_err(|e| {
                let reason = if e.kind() == ErrorKind::NotFound {
                    format!("'{}' executable not found", self.rpm_command)
                } else {
                    format!("failed to run '{}': {e}", self.rpm_command)
                };
                LayerScanError::ExtractorFailed {
                    extractor: self.name().to_owned(),
                    reason,
                }
            })?;

        if !output.status.success() {
            return Err(LayerScanError::parse(
                db_dir,
                format!(
                    "rpm query failed ({}): {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Extractor for RpmExtractor {
    fn name(&self) -> &'static str {
        "rpm"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        let db_dirs: BTreeSet<&str> = candidates
            .iter()
            .filter(|p| p.contains("rpm/Packages") || p.ends_with("rpmdb.sqlite"))
            .map(|p| parent_dir(p))
            .collect();
        if db_dirs.is_empty() {
            return Ok(extraction);
        }

        let yum_files: Vec<&String> = candidates
            .iter()
            .filter(|p| YUM_PATHS.iter().any(|y| p.contains(y)))
            .collect();

        for db_dir in db_dirs {
            let output = match self.query(root, db_dir) {
                Ok(output) => output,
                Err(e @ LayerScanError::ExtractorFailed { .. }) => return Err(e),
                Err(e) => {
                    warn!(db = %db_dir, error = %e, "rpm database unreadable");
                    extraction.skip(db_dir, e);
                    continue;
                }
            };

            let packages = parse_query_output(&output);
            debug!(db = %db_dir, packages = packages.len(), "rpm database");
            let db_files: Vec<&String> = files_under(candidates, db_dir).collect();

            for package in packages {
                let files = package
                    .files
                    .into_iter()
                    .chain(db_files.iter().map(|f| (*f).clone()))
                    .chain(yum_files.iter().map(|f| (*f).clone()));
                extraction.add_within(package.identity, files, candidates);
            }
        }

        Ok(extraction)
    }
}

/// `QUERY_FORMAT` 출력을 패키지 목록으로 바꿉니다.
pub fn parse_query_output(output: &str) -> Vec<RpmPackage> {
    let mut packages = Vec::new();

    for line in output.lines() {
        if let Some(header) = line.strip_prefix(HEADER_PREFIX) {
            let fields: Vec<&str> = header.split('\t').collect();
            let field = |i: usize| {
                fields
                    .get(i)
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty() && *s != NONE)
                    .map(str::to_owned)
            };
            let Some(name) = field(0) else {
                continue;
            };
            let version = match (field(2), field(3)) {
                (Some(v), Some(r)) => Some(format!("{v}-{r}")),
                (v, _) => v,
            };
            let identity = RawPackage::new(name, version, Ecosystem::Rpm)
                .epoch(field(1))
                .arch(field(4))
                .author(field(5))
                .normalize();
            packages.push(RpmPackage {
                identity,
                files: Vec::new(),
            });
            continue;
        }

        let path = line.trim();
        if path.is_empty() || path == NONE {
            continue;
        }
        if let Some(current) = packages.last_mut() {
            current.files.push(path.trim_start_matches('/').to_owned());
        }
    }

    packages
}
