//! 경로 정규화 -- 파일 유니버스 수집과 심볼릭 링크 중복 해소
//!
//! [`canonicalize`]는 루트 아래의 모든 비디렉토리 항목을 상대 경로로 수집합니다.
//! [`resolve_duplicate_links`]는 같은 실제 파일을 가리키는 링크 경로를 찾아
//! 스캔 전에 제거할 목록을 돌려줍니다.
//!
//! 링크 해석은 루트에 갇혀 있습니다. 절대 경로 타겟은 루트 기준으로 다시 붙이고
//! `..`는 루트를 넘어가지 않습니다.

use std::collections::VecDeque;
use std::path::{Component, Path};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::LayerScanError;
use crate::types::FileSet;

/// 링크 해석 최대 단계 (Linux `MAXSYMLINKS`와 같은 값)
const MAX_LINK_HOPS: usize = 40;

/// 유니버스에 포함되기 위한 최소 경로 길이 (초과해야 함)
const MIN_PATH_LEN: usize = 2;

/// 루트 디렉토리 아래의 파일 유니버스를 수집합니다.
///
/// 숨김 항목을 포함하고 디렉토리(디렉토리를 가리키는 링크 포함)는 제외합니다.
/// `excludes`의 부분 문자열을 포함하는 경로는 버립니다.
///
/// # Errors
///
/// 루트 자체를 읽을 수 없을 때만 `RootUnreadable`을 반환합니다.
/// 하위 항목의 읽기 실패는 경고 후 건너뜁니다.
pub fn canonicalize(root: &Path, excludes: &[String]) -> Result<FileSet, LayerScanError> {
    std::fs::read_dir(root).map_err(|e| LayerScanError::RootUnreadable {
        path: root.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut files = FileSet::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            // 제외 대상 디렉토리는 하위로 내려가지 않음
            match relative_path(root, entry.path()) {
                Some(rel) => !is_excluded(&format!("{rel}/"), excludes),
                None => true,
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "failed to read directory entry, skipping");
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        let Some(rel) = relative_path(root, entry.path()) else {
            debug!(path = %entry.path().display(), "non utf-8 path, skipping");
            continue;
        };
        if file_type.is_symlink() && links_to_dir(root, &rel) {
            continue;
        }
        if rel.len() <= MIN_PATH_LEN || is_excluded(&rel, excludes) {
            continue;
        }
        files.insert(rel);
    }

    debug!(root = %root.display(), files = files.len(), "file universe collected");
    Ok(files)
}

/// 링크 경로 중 실제 위치가 이미 유니버스에 있는 것을 찾습니다.
///
/// 반환된 경로는 별칭(링크) 쪽입니다. 실제 경로는 유니버스에 남습니다.
pub fn resolve_duplicate_links(root: &Path, universe: &FileSet) -> FileSet {
    let mut duplicates = FileSet::new();

    for path in universe {
        let is_link = std::fs::symlink_metadata(root.join(path))
            .is_ok_and(|m| m.file_type().is_symlink());
        if !is_link {
            continue;
        }
        let Some(real) = resolve_in_root(root, path) else {
            debug!(path = %path, "link resolution exceeded hop limit");
            continue;
        };
        if real != *path && universe.contains(&real) {
            debug!(path = %path, target = %real, "duplicate link");
            duplicates.insert(path.clone());
        }
    }

    duplicates
}

/// 루트에 갇힌 심볼릭 링크 해석
///
/// 경로의 모든 구성 요소에 대해 링크를 따라갑니다. 존재하지 않는 구성 요소는
/// 그대로 이어 붙입니다. 링크 단계가 한도를 넘으면 `None`입니다.
pub fn resolve_in_root(root: &Path, rel: &str) -> Option<String> {
    let mut resolved: Vec<String> = Vec::new();
    let mut pending: VecDeque<String> = split_components(rel).collect();
    let mut hops = 0;

    while let Some(component) = pending.pop_front() {
        match component.as_str() {
            "." => continue,
            ".." => {
                resolved.pop();
                continue;
            }
            _ => resolved.push(component),
        }

        let full = root.join(resolved.join("/"));
        let Ok(meta) = std::fs::symlink_metadata(&full) else {
            continue;
        };
        if !meta.file_type().is_symlink() {
            continue;
        }

        hops += 1;
        if hops > MAX_LINK_HOPS {
            return None;
        }
        let target = std::fs::read_link(&full).ok()?;
        let target = target.to_str()?;

        resolved.pop();
        if target.starts_with('/') {
            resolved.clear();
        }
        let mut next: VecDeque<String> = split_components(target).collect();
        next.extend(pending.drain(..));
        pending = next;
    }

    Some(resolved.join("/"))
}

/// 링크가 루트 안의 디렉토리를 가리키는지 확인합니다.
fn links_to_dir(root: &Path, rel: &str) -> bool {
    resolve_in_root(root, rel)
        .is_some_and(|real| std::fs::metadata(root.join(real)).is_ok_and(|m| m.is_dir()))
}

/// 루트 기준 슬래시 구분 상대 경로
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

fn split_components(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_owned)
}

fn is_excluded(path: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|pattern| path.contains(pattern.as_str()))
}
