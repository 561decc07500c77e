//! Python 배포 메타데이터 추출기
//!
//! `site-packages`/`dist-packages` 아래의 `*.dist-info`, `*.egg-info`를 찾습니다.
//! 이름과 버전은 `METADATA`/`PKG-INFO` 헤더에서 읽고, 없으면 디렉토리 이름에서 추론합니다.
//! 설치 파일 목록은 `RECORD`, `installed-files.txt`, `SOURCES.txt`에서 가져옵니다.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::LayerScanError;
use crate::extractor::{Extractor, files_under, join_relative, parent_dir, read_text_capped};
use crate::ledger::Extraction;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

const DIST_INFO: &str = ".dist-info";
const EGG_INFO: &str = ".egg-info";

/// Python 추출기
pub struct PythonExtractor {
    max_size: u64,
}

impl PythonExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    fn extract_info_dir(
        &self,
        info: &str,
        single_file: bool,
        candidates: &FileSet,
        root: &Path,
        extraction: &mut Extraction,
    ) {
        let metadata_file = if single_file {
            info.to_owned()
        } else if info.ends_with(DIST_INFO) {
            format!("{info}/METADATA")
        } else {
            format!("{info}/PKG-INFO")
        };

        let headers = if candidates.contains(&metadata_file) {
            match read_text_capped(root, &metadata_file, self.max_size) {
                Ok(text) => parse_headers(&text),
                Err(e) => {
                    extraction.skip(&metadata_file, e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        let (fallback_name, fallback_version) = name_from_dir(info);
        let name = headers.get("Name").cloned().or(fallback_name);
        let version = headers.get("Version").cloned().or(fallback_version);
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            extraction.skip(info, "no package name in metadata or directory name");
            return;
        };
        let version = version.map(|v| v.replace(".dist", ""));

        let site_dir = parent_dir(info);
        let mut files: Vec<String> = if single_file {
            vec![info.to_owned()]
        } else {
            files_under(candidates, info).cloned().collect()
        };

        let listings = if single_file {
            Vec::new()
        } else {
            vec![
                ("RECORD", site_dir),
                ("installed-files.txt", info),
                ("SOURCES.txt", site_dir),
            ]
        };
        for (listing, base) in listings {
            let listing = format!("{info}/{listing}");
            if !candidates.contains(&listing) {
                continue;
            }
            match read_text_capped(root, &listing, self.max_size) {
                Ok(text) => files.extend(
                    text.lines()
                        .filter_map(record_path)
                        .filter_map(|p| join_relative(base, p)),
                ),
                Err(e) => extraction.skip(&listing, e),
            }
        }

        debug!(info = %info, package = %name, files = files.len(), "python distribution");
        extraction.add_within(
            PackageIdentity::new(name, version, Ecosystem::PyPI),
            files,
            candidates,
        );
    }
}

impl Extractor for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        // info 디렉토리 -> 단일 파일 egg-info 여부
        let mut info_dirs: BTreeMap<String, bool> = BTreeMap::new();
        for path in candidates {
            if let Some(info) = info_dir_of(path) {
                let single_file = info.len() == path.len();
                info_dirs.entry(info.to_owned()).or_insert(single_file);
            }
        }

        for (info, single_file) in &info_dirs {
            self.extract_info_dir(info, *single_file, candidates, root, &mut extraction);
        }

        Ok(extraction)
    }
}

/// 경로에서 첫 번째 `*.dist-info`/`*.egg-info` 구성 요소까지의 접두
fn info_dir_of(path: &str) -> Option<&str> {
    let mut end = 0;
    for component in path.split('/') {
        end += component.len();
        if component.ends_with(DIST_INFO) || component.ends_with(EGG_INFO) {
            return Some(&path[..end]);
        }
        end += 1;
    }
    None
}

/// `foo_bar-1.2.3.dist-info`, `pygpgme-0.3-py2.7.egg-info` 형식에서 이름과 버전 추론
fn name_from_dir(info: &str) -> (Option<String>, Option<String>) {
    let base = crate::extractor::file_name(info)
        .trim_end_matches(DIST_INFO)
        .trim_end_matches(EGG_INFO);
    let mut tokens = base.split('-');
    let name = tokens
        .next()
        .map(|n| n.replace(".wh.", ""))
        .filter(|n| !n.is_empty());
    let version = tokens
        .next()
        .map(|v| v.trim_end_matches(".egg").to_owned())
        .filter(|v| !v.is_empty());
    (name, version)
}

/// RFC 822 스타일 헤더를 본문 시작 전까지 읽습니다. 같은 키는 처음 값이 이깁니다.
fn parse_headers(text: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers
                .entry(key.trim().to_owned())
                .or_insert_with(|| value.trim().to_owned());
        }
    }
    headers
}

/// RECORD CSV 행의 첫 열 (따옴표 처리 포함)
fn record_path(line: &str) -> Option<&str> {
    let line = line.trim_end();
    let path = if let Some(quoted) = line.strip_prefix('"') {
        quoted.split('"').next()?
    } else {
        line.split(',').next()?
    };
    (!path.is_empty()).then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn universe(root: &Path) -> FileSet {
        crate::canonical::canonicalize(root, &[]).unwrap()
    }

    const SITE: &str = "usr/lib/python3/dist-packages";

    #[test]
    fn dist_info_with_record() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            &format!("{SITE}/requests-2.31.0.dist-info/METADATA"),
            "Metadata-Version: 2.1\nName: requests\nVersion: 2.31.0\n\
             Author: Kenneth\n\nbody: text\n",
        );
        write(
            root,
            &format!("{SITE}/requests-2.31.0.dist-info/RECORD"),
            "requests/__init__.py,sha256=abc,123\nrequests/api.py,,\n../../../bin/requests-cli,,\n",
        );
        write(root, &format!("{SITE}/requests/__init__.py"), "");
        write(root, &format!("{SITE}/requests/api.py"), "");
        write(root, "usr/bin/requests-cli", "");
        write(root, &format!("{SITE}/other/mod.py"), "");

        let candidates = universe(root);
        let result = PythonExtractor::new(1 << 20).extract(&candidates, root).unwrap();

        let id = PackageIdentity::new("requests", Some("2.31.0".into()), Ecosystem::PyPI);
        let files = &result.packages[&id];
        assert!(files.contains(&format!("{SITE}/requests/__init__.py")));
        assert!(files.contains(&format!("{SITE}/requests/api.py")));
        assert!(files.contains(&format!("{SITE}/requests-2.31.0.dist-info/METADATA")));
        assert!(files.contains("usr/bin/requests-cli"));
        assert!(!files.contains(&format!("{SITE}/other/mod.py")));
    }

    #[test]
    fn egg_info_directory_with_installed_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            &format!("{SITE}/six-1.16.0.egg-info/PKG-INFO"),
            "Name: six\nVersion: 1.16.0\n",
        );
        write(
            root,
            &format!("{SITE}/six-1.16.0.egg-info/installed-files.txt"),
            "../six.py\n",
        );
        write(root, &format!("{SITE}/six.py"), "");

        let candidates = universe(root);
        let result = PythonExtractor::new(1 << 20).extract(&candidates, root).unwrap();

        let id = PackageIdentity::new("six", Some("1.16.0".into()), Ecosystem::PyPI);
        assert!(result.packages[&id].contains(&format!("{SITE}/six.py")));
    }

    #[test]
    fn single_file_egg_info_falls_back_to_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            &format!("{SITE}/pygpgme-0.3-py2.7.egg-info"),
            "Metadata-Version: 1.0\n",
        );

        let candidates = universe(root);
        let result = PythonExtractor::new(1 << 20).extract(&candidates, root).unwrap();

        let id = PackageIdentity::new("pygpgme", Some("0.3".into()), Ecosystem::PyPI);
        assert_eq!(result.packages[&id].len(), 1);
    }

    #[test]
    fn record_entries_outside_candidates_are_not_claimed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            &format!("{SITE}/a-1.0.dist-info/RECORD"),
            "a.py,,\nmissing.py,,\n",
        );
        write(root, &format!("{SITE}/a.py"), "");

        let candidates = universe(root);
        let result = PythonExtractor::new(1 << 20).extract(&candidates, root).unwrap();
        for files in result.packages.values() {
            assert!(files.is_subset(&candidates));
        }
    }

    #[test]
    fn info_dir_prefix() {
        assert_eq!(
            info_dir_of("lib/site-packages/x-1.dist-info/RECORD"),
            Some("lib/site-packages/x-1.dist-info")
        );
        assert_eq!(info_dir_of("lib/site-packages/x.py"), None);
    }

    #[test]
    fn record_path_handles_quotes() {
        assert_eq!(record_path("\"a,b.py\",sha256=x,1"), Some("a,b.py"));
        assert_eq!(record_path("plain.py,,"), Some("plain.py"));
        assert_eq!(record_path(""), None);
    }
}
