//! Alpine apk 데이터베이스 추출기
//!
//! `lib/apk/db/installed`는 빈 줄로 구분된 항목마다 한 글자 키를 가집니다.
//!
//! | 키 | 의미 |
//! |----|------|
//! | `P` | 패키지 이름 |
//! | `V` | 버전 |
//! | `A` | 아키텍처 |
//! | `F` | 디렉토리 (이후 `R` 항목의 기준) |
//! | `R` | 파일 이름 |
//!
//! `etc/apk/world`에만 있는 이름은 버전 없는 패키지로 기록합니다.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::error::LayerScanError;
use crate::extractor::{Extractor, read_text_capped};
use crate::ledger::Extraction;
use crate::normalize::RawPackage;
use crate::types::{Ecosystem, FileSet};

const INSTALLED_DB: &str = "apk/db/installed";
const WORLD_FILE: &str = "apk/world";

/// apk 설치 DB 항목
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApkEntry {
    /// `P:`
    pub name: String,
    /// `V:`
    pub version: Option<String>,
    /// `A:`
    pub arch: Option<String>,
    /// `F:` + `R:` 조합 경로
    pub files: Vec<String>,
}

/// apk 추출기
pub struct ApkExtractor {
    max_size: u64,
}

impl ApkExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

impl Extractor for ApkExtractor {
    fn name(&self) -> &'static str {
        "apk"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();
        let mut installed_names = BTreeSet::new();

        for db in candidates.iter().filter(|p| p.ends_with(INSTALLED_DB)) {
            let text = match read_text_capped(root, db, self.max_size) {
                Ok(text) => text,
                Err(e) => {
                    extraction.skip(db, e);
                    continue;
                }
            };
            let entries = parse_installed(&text);
            debug!(path = %db, packages = entries.len(), "apk installed db");

            for entry in entries {
                installed_names.insert(entry.name.clone());
                let identity = RawPackage::new(entry.name, entry.version, Ecosystem::Apk)
                    .arch(entry.arch)
                    .normalize();
                let files = entry.files.into_iter().chain(std::iter::once(db.clone()));
                extraction.add_within(identity, files, candidates);
            }
        }

        for world in candidates.iter().filter(|p| p.ends_with(WORLD_FILE)) {
            let text = match read_text_capped(root, world, self.max_size) {
                Ok(text) => text,
                Err(e) => {
                    extraction.skip(world, e);
                    continue;
                }
            };
            for name in text.split_whitespace() {
                // `name=ver`, `name>ver` 등 제약 제거
                let name = name
                    .split(['=', '<', '>', '~'])
                    .next()
                    .unwrap_or_default();
                if name.is_empty() || installed_names.contains(name) {
                    continue;
                }
                extraction.add_within(
                    RawPackage::new(name, None, Ecosystem::Apk).normalize(),
                    [world.as_str()],
                    candidates,
                );
            }
        }

        Ok(extraction)
    }
}

/// `installed` DB를 항목 목록으로 파싱합니다.
pub fn parse_installed(text: &str) -> Vec<ApkEntry> {
    let mut entries = Vec::new();

    for block in text.split("\n\n") {
        let mut entry = ApkEntry::default();
        let mut folder = String::new();

        for line in block.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key {
                "P" => entry.name = value.to_owned(),
                "V" => entry.version = Some(value.to_owned()),
                "A" => entry.arch = Some(value.to_owned()),
                "F" => folder = value.trim_matches('/').to_owned(),
                "R" if folder.is_empty() => entry.files.push(value.to_owned()),
                "R" => entry.files.push(format!("{folder}/{value}")),
                _ => {}
            }
        }

        if !entry.name.is_empty() {
            entries.push(entry);
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackageIdentity;
    use std::fs;

    const INSTALLED: &str = "\
C:Q1abc=
P:musl
V:1.2.4-r2
A:x86_64
F:lib
R:ld-musl-x86_64.so.1
R:libc.musl-x86_64.so.1

P:busybox
V:1.36.1-r5
A:x86_64
F:bin
R:busybox
F:etc
R:securetty
";

    #[test]
    fn parses_entries() {
        let entries = parse_installed(INSTALLED);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "musl");
        assert_eq!(
            entries[0].files,
            vec!["lib/ld-musl-x86_64.so.1", "lib/libc.musl-x86_64.so.1"]
        );
        assert_eq!(entries[1].files, vec!["bin/busybox", "etc/securetty"]);
    }

    #[test]
    fn installed_db_and_world() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("lib/apk/db")).unwrap();
        fs::write(root.join("lib/apk/db/installed"), INSTALLED).unwrap();
        fs::create_dir_all(root.join("etc/apk")).unwrap();
        fs::write(root.join("etc/apk/world"), "busybox\nca-certificates>=20230506\n").unwrap();
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/busybox"), b"").unwrap();
        fs::write(root.join("etc/securetty"), b"").unwrap();

        let candidates = crate::canonical::canonicalize(root, &[]).unwrap();
        let result = ApkExtractor::new(1 << 20).extract(&candidates, root).unwrap();

        let busybox = PackageIdentity::new("busybox", Some("1.36.1-r5".into()), Ecosystem::Apk)
            .with_arch(Some("x86_64".into()));
        let files = &result.packages[&busybox];
        assert!(files.contains("bin/busybox"));
        assert!(files.contains("etc/securetty"));
        assert!(files.contains("lib/apk/db/installed"));

        let certs = PackageIdentity::new("ca-certificates", None, Ecosystem::Apk);
        assert!(result.packages[&certs].contains("etc/apk/world"));
        assert!(
            result
                .packages
                .keys()
                .all(|p| p.name != "busybox" || p.version.is_some())
        );
    }
}
