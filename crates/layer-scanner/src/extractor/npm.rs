//! npm 패키지 추출기
//!
//! 두 가지 소스를 사용합니다.
//!
//! - `package.json`: 해당 디렉토리 아래 파일 (중첩 `node_modules` 제외)을 소유
//! - `package-lock.json` (v2/v3): `packages` 맵의 각 항목이 자신의 설치 디렉토리를 소유
//!
//! # package-lock.json v3 형식 예시
//!
//! ```json
//! {
//!   "name": "my-app",
//!   "lockfileVersion": 3,
//!   "packages": {
//!     "": { "name": "my-app", "version": "1.0.0" },
//!     "node_modules/lodash": { "version": "4.17.21" }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::LayerScanError;
use crate::extractor::{
    Extractor, file_name, files_under, join_relative, parent_dir, read_text_capped,
};
use crate::ledger::Extraction;
use crate::normalize::RawPackage;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

const NODE_MODULES: &str = "node_modules/";

/// npm 추출기
pub struct NpmExtractor {
    max_size: u64,
}

/// package.json (파싱용)
#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// package-lock.json 구조 (파싱용)
#[derive(Deserialize)]
struct NpmLockFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    packages: HashMap<String, NpmPackageEntry>,
}

/// package-lock.json 내 개별 패키지 (파싱용)
#[derive(Deserialize)]
struct NpmPackageEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

impl NpmExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    fn parse_json<T: for<'de> Deserialize<'de>>(
        &self,
        root: &Path,
        path: &str,
    ) -> Result<T, LayerScanError> {
        let text = read_text_capped(root, path, self.max_size)?;
        serde_json::from_str(&text).map_err(|e| LayerScanError::parse(path, e.to_string()))
    }

    fn extract_manifest(
        &self,
        path: &str,
        candidates: &FileSet,
        root: &Path,
        out: &mut Extraction,
    ) {
        let manifest: PackageJson = match self.parse_json(root, path) {
            Ok(m) => m,
            Err(e) => {
                out.skip(path, e);
                return;
            }
        };
        let Some(name) = manifest.name.filter(|n| !n.is_empty()) else {
            debug!(path = %path, "package.json without name");
            return;
        };

        let dir = parent_dir(path);
        out.add_within(
            npm_identity(&name, manifest.version),
            owned_files(candidates, dir),
            candidates,
        );
    }

    fn extract_lockfile(
        &self,
        path: &str,
        candidates: &FileSet,
        root: &Path,
        out: &mut Extraction,
    ) {
        let lock: NpmLockFile = match self.parse_json(root, path) {
            Ok(l) => l,
            Err(e) => {
                out.skip(path, e);
                return;
            }
        };
        let dir = parent_dir(path);

        // 루트 항목은 키가 빈 문자열
        let root_entry = lock.packages.get("");
        let root_name = root_entry.and_then(|e| e.name.clone()).or(lock.name);
        let root_version = root_entry.and_then(|e| e.version.clone()).or(lock.version);
        if let Some(name) = root_name.filter(|n| !n.is_empty()) {
            out.add_within(npm_identity(&name, root_version), [path], candidates);
        }

        for (key, entry) in &lock.packages {
            if key.is_empty() {
                continue;
            }
            let Some(version) = entry.version.clone() else {
                continue;
            };
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| package_name_from_key(key).to_owned());
            let Some(install_dir) = join_relative(dir, key) else {
                continue;
            };
            out.add_within(
                npm_identity(&name, Some(version)),
                owned_files(candidates, &install_dir),
                candidates,
            );
        }
    }
}

impl Extractor for NpmExtractor {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        for path in candidates {
            match file_name(path) {
                "package.json" => self.extract_manifest(path, candidates, root, &mut extraction),
                "package-lock.json" if !path.contains(NODE_MODULES) => {
                    self.extract_lockfile(path, candidates, root, &mut extraction);
                }
                _ => {}
            }
        }

        Ok(extraction)
    }
}

/// `@scope/name`은 author=scope, name=name으로 분리합니다.
fn npm_identity(full_name: &str, version: Option<String>) -> PackageIdentity {
    let (author, name) = match full_name.strip_prefix('@').and_then(|s| s.split_once('/')) {
        Some((scope, name)) => (Some(scope.to_owned()), name),
        None => (None, full_name),
    };
    RawPackage::new(name, version, Ecosystem::Npm)
        .author(author)
        .normalize()
}

/// `node_modules/a/node_modules/@s/b` -> `@s/b`
fn package_name_from_key(key: &str) -> &str {
    key.rfind(NODE_MODULES)
        .map_or(key, |pos| &key[pos + NODE_MODULES.len()..])
}

/// 디렉토리 아래 파일 중 중첩 `node_modules`에 속하지 않는 것
fn owned_files<'a>(candidates: &'a FileSet, dir: &'a str) -> impl Iterator<Item = String> + 'a {
    let skip = if dir.is_empty() { 0 } else { dir.len() + 1 };
    files_under(candidates, dir)
        .filter(move |p| {
            let rest = &p[skip..];
            !rest.starts_with(NODE_MODULES) && !rest.contains("/node_modules/")
        })
        .cloned()
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

    fn npm(name: &str, version: &str) -> PackageIdentity {
        PackageIdentity::new(name, Some(version.into()), Ecosystem::Npm)
    }

    #[test]
    fn package_json_owns_its_directory_but_not_nested_modules() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "app/node_modules/express/package.json",
            r#"{"name":"express","version":"4.18.2"}"#,
        );
        write(root, "app/node_modules/express/index.js", "");
        write(
            root,
            "app/node_modules/express/node_modules/qs/package.json",
            r#"{"name":"qs","version":"6.11.0"}"#,
        );
        write(
            root,
            "app/node_modules/express/node_modules/qs/lib/index.js",
            "",
        );

        let candidates = crate::canonical::canonicalize(root, &[]).unwrap();
        let result = NpmExtractor::new(1 << 20).extract(&candidates, root).unwrap();

        let express = &result.packages[&npm("express", "4.18.2")];
        assert!(express.contains("app/node_modules/express/index.js"));
        assert!(!express.contains("app/node_modules/express/node_modules/qs/lib/index.js"));

        let qs = &result.packages[&npm("qs", "6.11.0")];
        assert!(qs.contains("app/node_modules/express/node_modules/qs/lib/index.js"));
    }

    #[test]
    fn scoped_names_split_into_author() {
        let id = npm_identity("@babel/core", Some("7.23.0".into()));
        assert_eq!(id.name, "core");
        assert_eq!(id.author.as_deref(), Some("babel"));

        let id = npm_identity("lodash", None);
        assert_eq!(id.name, "lodash");
        assert!(id.author.is_none());
    }

    #[test]
    fn lockfile_entries_own_install_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "srv/package-lock.json",
            r#"{
  "name": "my-app",
  "version": "1.0.0",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "my-app", "version": "1.0.0" },
    "node_modules/lodash": { "version": "4.17.21" },
    "node_modules/@types/node": { "version": "20.1.0" },
    "node_modules/no-version": {}
  }
}"#,
        );
        write(root, "srv/node_modules/lodash/lodash.js", "");
        write(root, "srv/node_modules/@types/node/index.d.ts", "");

        let candidates = crate::canonical::canonicalize(root, &[]).unwrap();
        let result = NpmExtractor::new(1 << 20).extract(&candidates, root).unwrap();

        assert!(result.packages[&npm("my-app", "1.0.0")].contains("srv/package-lock.json"));
        assert!(
            result.packages[&npm("lodash", "4.17.21")]
                .contains("srv/node_modules/lodash/lodash.js")
        );
        let types = npm("node", "20.1.0").with_author(Some("types".into()));
        assert!(result.packages[&types].contains("srv/node_modules/@types/node/index.d.ts"));
        assert_eq!(result.packages.len(), 3);
    }

    #[test]
    fn malformed_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app/package.json", "{ not json");

        let candidates = crate::canonical::canonicalize(root, &[]).unwrap();
        let result = NpmExtractor::new(1 << 20).extract(&candidates, root).unwrap();
        assert!(result.packages.is_empty());
        assert_eq!(result.skipped.len(), 1);
    }

    #[test]
    fn key_to_package_name() {
        assert_eq!(package_name_from_key("node_modules/a"), "a");
        assert_eq!(
            package_name_from_key("node_modules/a/node_modules/@s/b"),
            "@s/b"
        );
        assert_eq!(package_name_from_key("packages/local"), "packages/local");
    }
}
