//! PHP Composer 추출기
//!
//! `composer.lock`의 `packages`/`packages-dev` 항목은 `vendor/<vendor>/<name>/` 아래 파일을,
//! 프로젝트 `composer.json`은 자기 자신과 PSR 오토로드 디렉토리를 소유합니다.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::LayerScanError;
use crate::extractor::{
    Extractor, file_name, files_under, join_relative, parent_dir, read_text_capped,
};
use crate::ledger::Extraction;
use crate::normalize::RawPackage;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

/// Composer 추출기
pub struct ComposerExtractor {
    max_size: u64,
}

#[derive(Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<LockedPackage>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<LockedPackage>,
}

#[derive(Deserialize)]
struct LockedPackage {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Deserialize)]
struct ComposerJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    autoload: BTreeMap<String, Value>,
}

impl ComposerExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    fn extract_lock(&self, path: &str, candidates: &FileSet, root: &Path, out: &mut Extraction) {
        let lock: ComposerLock = match read_text_capped(root, path, self.max_size).and_then(|t| {
            serde_json::from_str(&t).map_err(|e| LayerScanError::parse(path, e.to_string()))
        }) {
            Ok(lock) => lock,
            Err(e) => {
                out.skip(path, e);
                return;
            }
        };

        let base = parent_dir(path);
        for package in lock.packages.iter().chain(&lock.packages_dev) {
            let identity = composer_identity(&package.name, package.version.clone());
            let Some(install_dir) = join_relative(base, &format!("vendor/{}", package.name)) else {
                continue;
            };
            let files = files_under(candidates, &install_dir)
                .cloned()
                .chain(std::iter::once(path.to_owned()));
            out.add_within(identity, files, candidates);
        }
    }

    fn extract_manifest(
        &self,
        path: &str,
        candidates: &FileSet,
        root: &Path,
        out: &mut Extraction,
    ) {
        let parsed = read_text_capped(root, path, self.max_size).and_then(|t| {
            serde_json::from_str(&t).map_err(|e| LayerScanError::parse(path, e.to_string()))
        });
        let manifest: ComposerJson = match parsed {
            Ok(m) => m,
            Err(e) => {
                out.skip(path, e);
                return;
            }
        };
        let Some(name) = manifest.name else {
            return;
        };

        let base = parent_dir(path);
        let mut files = vec![path.to_owned()];
        for dir in autoload_dirs(&manifest.autoload) {
            if let Some(dir) = join_relative(base, &dir) {
                files.extend(files_under(candidates, &dir).cloned());
            }
        }
        out.add_within(composer_identity(&name, manifest.version), files, candidates);
    }
}

impl Extractor for ComposerExtractor {
    fn name(&self) -> &'static str {
        "composer"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        for path in candidates {
            match file_name(path) {
                "composer.lock" => self.extract_lock(path, candidates, root, &mut extraction),
                "composer.json" if !path.contains("vendor/") => {
                    self.extract_manifest(path, candidates, root, &mut extraction);
                }
                _ => {}
            }
        }

        Ok(extraction)
    }
}

/// `vendor/name` -> author=vendor, name=name
fn composer_identity(full_name: &str, version: Option<String>) -> PackageIdentity {
    let (author, name) = match full_name.split_once('/') {
        Some((vendor, name)) => (Some(vendor.to_owned()), name),
        None => (None, full_name),
    };
    RawPackage::new(name, version, Ecosystem::Composer)
        .author(author)
        .normalize()
}

/// `autoload.psr-4`/`psr-0` 값에서 디렉토리 목록을 모읍니다.
fn autoload_dirs(autoload: &BTreeMap<String, Value>) -> Vec<String> {
    let mut dirs = Vec::new();
    for (kind, mapping) in autoload {
        if !kind.starts_with("psr") {
            continue;
        }
        let Some(mapping) = mapping.as_object() else {
            continue;
        };
        for value in mapping.values() {
            match value {
                Value::String(dir) => dirs.push(dir.trim_end_matches('/').to_owned()),
                Value::Array(items) => dirs.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|d| d.trim_end_matches('/').to_owned()),
                ),
                _ => {}
            }
        }
    }
    dirs
}
