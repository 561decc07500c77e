//! dnf 트랜잭션 이력 추출기
//!
//! rpmdb 없이 `var/lib/dnf/history.sqlite`만 남은 레이어에서도 설치 패키지를
//! 알 수 있도록 이력 DB의 `rpm` 테이블을 읽습니다. 패키지는 이력 DB 파일만 소유합니다.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::error::LayerScanError;
use crate::extractor::{Extractor, confined_path};
use crate::ledger::Extraction;
use crate::normalize::RawPackage;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

/// 이력 DB 경로
pub const HISTORY_DB: &str = "var/lib/dnf/history.sqlite";

const QUERY: &str = "SELECT name, epoch, version, release, arch FROM rpm";

/// dnf 이력 추출기
#[derive(Debug, Default)]
pub struct DnfExtractor;

impl DnfExtractor {
    /// 추출기를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    fn read_history(&self, root: &Path) -> Result<Vec<PackageIdentity>, LayerScanError> {
        let path = confined_path(root, HISTORY_DB)?;
        let sqlite_err = |e: rusqlite::Error| LayerScanError::parse(HISTORY_DB, e.to_string());

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(sqlite_err)?;
        let mut stmt = conn.prepare(QUERY).map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(HistoryRow {
                    name: row.get(0)?,
                    epoch: row.get(1)?,
                    version: row.get(2)?,
                    release: row.get(3)?,
                    arch: row.get(4)?,
                })
            })
            .map_err(sqlite_err)?;

        let mut packages = Vec::new();
        for row in rows {
            packages.push(row.map_err(sqlite_err)?.identity());
        }
        Ok(packages)
    }
}

/// `rpm` 테이블의 행 하나
struct HistoryRow {
    name: String,
    epoch: Option<i64>,
    version: Option<String>,
    release: Option<String>,
    arch: Option<String>,
}

impl HistoryRow {
    /// rpm 추출기와 같은 `version-release` 형식을 씁니다. epoch 0은 없음으로 봅니다.
    fn identity(self) -> PackageIdentity {
        let version = match (self.version, self.release) {
            (Some(v), Some(r)) if !r.is_empty() => Some(format!("{v}-{r}")),
            (v, _) => v,
        };
        RawPackage::new(self.name, version, Ecosystem::Rpm)
            .epoch(self.epoch.filter(|e| *e != 0).map(|e| e.to_string()))
            .arch(self.arch.filter(|a| !a.is_empty()))
            .normalize()
    }
}

impl Extractor for DnfExtractor {
    fn name(&self) -> &'static str {
        "dnf"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();
        if !candidates.contains(HISTORY_DB) {
            return Ok(extraction);
        }

        let packages = match self.read_history(root) {
            Ok(packages) => packages,
            Err(e) => {
                extraction.skip(HISTORY_DB, e);
                return Ok(extraction);
            }
        };
        debug!(path = HISTORY_DB, packages = packages.len(), "dnf history");

        // WAL 모드로 남은 보조 파일도 같은 DB의 일부
        let files: Vec<String> = ["", "-wal", "-shm"]
            .iter()
            .map(|suffix| format!("{HISTORY_DB}{suffix}"))
            .filter(|f| candidates.contains(f))
            .collect();
        for identity in packages {
            extraction.add(identity, files.iter().cloned());
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn history(root: &Path, rows: &[(&str, i64, &str, &str, &str)]) {
        let path = root.join(HISTORY_DB);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE rpm (
                item_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                epoch INTEGER NOT NULL,
                version TEXT NOT NULL,
                release TEXT NOT NULL,
                arch TEXT NOT NULL
            );",
        )
        .unwrap();
        for (name, epoch, version, release, arch) in rows {
            conn.execute(
                "INSERT INTO rpm (name, epoch, version, release, arch) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![name, epoch, version, release, arch],
            )
            .unwrap();
        }
    }

    #[test]
    fn reads_packages_from_history_db() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        history(
            root,
            &[
                ("bash", 0, "5.1.8", "9.el9", "x86_64"),
                ("shadow-utils", 2, "4.9", "8.el9", "x86_64"),
            ],
        );
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("usr/bin/bash"), b"").unwrap();

        let candidates = crate::canonical::canonicalize(root, &[]).unwrap();
        let result = DnfExtractor::new().extract(&candidates, root).unwrap();
        assert_eq!(result.packages.len(), 2);

        let bash = PackageIdentity::new("bash", Some("5.1.8-9.el9".into()), Ecosystem::Rpm)
            .with_arch(Some("x86_64".into()));
        let files = &result.packages[&bash];
        assert_eq!(files.len(), 1);
        assert!(files.contains(HISTORY_DB));

        let shadow = result
            .packages
            .keys()
            .find(|p| p.name == "shadow-utils")
            .unwrap();
        assert_eq!(shadow.epoch.as_deref(), Some("2"));
        assert_eq!(shadow.version.as_deref(), Some("4.9-8.el9"));
    }

    #[test]
    fn corrupt_history_db_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("var/lib/dnf")).unwrap();
        fs::write(root.join(HISTORY_DB), b"this is not sqlite").unwrap();

        let candidates = crate::canonical::canonicalize(root, &[]).unwrap();
        let result = DnfExtractor::new().extract(&candidates, root).unwrap();
        assert!(result.packages.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].path.as_deref(), Some(HISTORY_DB));
    }

    #[test]
    fn no_history_db_is_a_no_op() {
        let candidates: FileSet = ["var/lib/dnf/repos/fedora".to_owned()].into_iter().collect();
        let result = DnfExtractor::new()
            .extract(&candidates, Path::new("/nonexistent"))
            .unwrap();
        assert!(result.is_empty());
    }
}
