//! 생태계별 추출기
//!
//! [`Extractor`] trait은 모든 추출기가 구현하는 인터페이스입니다.
//! 추출기는 후보 파일 집합을 읽기 전용으로 받아 패키지와 귀속 파일을 돌려줍니다.
//! 반환하는 파일은 반드시 후보 집합의 원소여야 합니다.
//!
//! # 실패 처리
//!
//! - 후보 파일 하나의 파싱 실패: [`Extraction::skip`]으로 기록하고 계속 진행
//! - 추출기 전체 실패 (필요한 도구 없음 등): `Err` 반환, 오케스트레이터가 흡수
//!
//! # 선언 순서
//!
//! [`default_extractors`]가 돌려주는 순서가 우선순위입니다.
//! 두 추출기가 같은 파일을 주장할 수 있으면 먼저 실행된 쪽이 가져갑니다.

pub mod apk;
pub mod binary_strings;
pub mod composer;
pub mod dnf;
pub mod dpkg;
pub mod gem;
pub mod go_binary;
pub mod go_mod;
pub mod jar;
pub mod npm;
pub mod perl;
pub mod pkgconfig;
pub mod python;
pub mod rpm;

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::canonical::resolve_in_root;
use crate::config::ScanConfig;
use crate::error::LayerScanError;
use crate::ledger::Extraction;
use crate::types::FileSet;

pub use apk::ApkExtractor;
pub use binary_strings::BinaryStringsExtractor;
pub use composer::ComposerExtractor;
pub use dnf::DnfExtractor;
pub use dpkg::DpkgExtractor;
pub use gem::GemExtractor;
pub use go_binary::GoBinaryExtractor;
pub use go_mod::GoModExtractor;
pub use jar::JarExtractor;
pub use npm::NpmExtractor;
pub use perl::PerlExtractor;
pub use pkgconfig::PkgConfigExtractor;
pub use python::PythonExtractor;
pub use rpm::RpmExtractor;

/// 추출기가 받는 후보 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateScope {
    /// 아직 귀속되지 않은 모든 파일
    Remaining,
    /// 아직 귀속되지 않은 ELF 실행 파일과 공유 객체
    Executables,
}

/// 생태계별 추출기 trait
pub trait Extractor: Send + Sync {
    /// 로그와 진단에 쓰이는 이름
    fn name(&self) -> &'static str;

    /// 후보 범위 (기본: 남은 파일 전체)
    fn scope(&self) -> CandidateScope {
        CandidateScope::Remaining
    }

    /// 후보 파일에서 패키지를 식별합니다.
    ///
    /// # Arguments
    ///
    /// - `candidates`: 읽기 전용 후보 집합 (루트 기준 상대 경로)
    /// - `root`: 스캔 루트 디렉토리
    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError>;
}

/// 선언 우선순위 순서의 기본 추출기 목록
///
/// `binary-strings`는 `analyze_binaries`가 켜졌을 때만 마지막에 포함됩니다.
pub fn default_extractors(config: &ScanConfig) -> Vec<Box<dyn Extractor>> {
    let manifest_cap = config.max_manifest_size;
    let mut extractors: Vec<Box<dyn Extractor>> = vec![
        Box::new(GoBinaryExtractor::new(config.max_binary_size)),
        Box::new(PythonExtractor::new(manifest_cap)),
        Box::new(JarExtractor::new(manifest_cap)),
        Box::new(NpmExtractor::new(manifest_cap)),
        Box::new(ComposerExtractor::new(manifest_cap)),
        Box::new(PerlExtractor::new(manifest_cap)),
        Box::new(GemExtractor::new(manifest_cap)),
        Box::new(GoModExtractor::new(manifest_cap)),
        Box::new(DpkgExtractor::new(manifest_cap)),
        Box::new(RpmExtractor::new(config.rpm_command.clone())),
        Box::new(ApkExtractor::new(manifest_cap)),
        Box::new(DnfExtractor::new()),
        Box::new(PkgConfigExtractor::new(manifest_cap)),
    ];
    if config.analyze_binaries {
        extractors.push(Box::new(BinaryStringsExtractor::new(
            config.max_binary_size,
            config.min_string_length,
        )));
    }
    extractors
}

/// ELF 매직 넘버
const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// 실행 가능하거나 공유 객체인 ELF 파일인지 확인합니다.
///
/// 경로의 어느 구성 요소든 심볼릭 링크면 후보가 아닙니다.
pub fn is_elf_candidate(root: &Path, rel: &str) -> bool {
    if resolve_in_root(root, rel).as_deref() != Some(rel) {
        return false;
    }
    let path = root.join(rel);
    let Ok(meta) = std::fs::symlink_metadata(&path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    if !(is_executable(&meta) || file_name(rel).contains(".so")) {
        return false;
    }

    let mut magic = [0u8; 4];
    match std::fs::File::open(&path) {
        Ok(mut file) => file.read_exact(&mut magic).is_ok() && &magic == ELF_MAGIC,
        Err(_) => false,
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

/// 링크를 루트 안에서 해석한 실제 경로
///
/// 절대 경로 링크는 호스트가 아니라 레이어 루트 기준입니다.
pub fn confined_path(root: &Path, rel: &str) -> Result<PathBuf, LayerScanError> {
    resolve_in_root(root, rel)
        .map(|real| root.join(real))
        .ok_or_else(|| LayerScanError::LinkUnresolved {
            path: rel.to_owned(),
        })
}

/// 크기 상한을 지켜 파일 전체를 읽습니다.
///
/// 링크는 [`confined_path`]로 해석하므로 레이어 밖 파일은 읽지 않습니다.
pub fn read_capped(root: &Path, rel: &str, max: u64) -> Result<Vec<u8>, LayerScanError> {
    let path = confined_path(root, rel)?;
    let meta = std::fs::metadata(&path).map_err(|e| LayerScanError::io(rel, e))?;
    if meta.len() > max {
        return Err(LayerScanError::FileTooBig {
            path: rel.to_owned(),
            size: meta.len(),
            max,
        });
    }
    std::fs::read(&path).map_err(|e| LayerScanError::io(rel, e))
}

/// 크기 상한을 지켜 텍스트 파일을 읽습니다. 잘못된 UTF-8은 대체 문자로 바꿉니다.
pub fn read_text_capped(root: &Path, rel: &str, max: u64) -> Result<String, LayerScanError> {
    let bytes = read_capped(root, rel, max)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// 경로의 마지막 구성 요소
pub fn file_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// 경로의 부모 디렉토리 (최상위면 빈 문자열)
pub fn parent_dir(rel: &str) -> &str {
    rel.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// `dir` 아래에 있는 후보 파일 (dir 자체가 빈 문자열이면 전체)
pub fn files_under<'a>(candidates: &'a FileSet, dir: &str) -> impl Iterator<Item = &'a String> {
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    };
    candidates
        .range(prefix.clone()..)
        .take_while(move |p| p.starts_with(&prefix))
}

/// 부모 기준 상대 경로를 정규화된 상대 경로로 합칩니다.
///
/// 선행 `/`와 `./`를 제거하고 `..`를 해소합니다. 루트를 벗어나면 `None`입니다.
pub fn join_relative(base: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = if rel.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|s| !s.is_empty()).collect()
    };
    for part in rel.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            _ => parts.push(part),
        }
    }
    Some(parts.join("/"))
}
