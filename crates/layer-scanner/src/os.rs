//! 운영체제 식별
//!
//! 잘 알려진 릴리스 파일을 한 번 읽어 [`OsInfo`]를 만듭니다.
//! 파일 귀속에는 관여하지 않으므로 원장의 `remaining`은 바뀌지 않습니다.
//!
//! # 읽는 순서
//!
//! 1. `usr/lib/os-release`
//! 2. `etc/os-release` (1번과 겹치는 필드를 덮어씀)
//! 3. `etc/debian_version` (비어 있는 필드만 채움)
//! 4. `etc/alpine-release` (비어 있는 필드만 채움)

use std::path::Path;

use tracing::{debug, warn};

use crate::extractor::read_text_capped;
use crate::types::{FileSet, OsInfo};

const OS_RELEASE_FILES: &[&str] = &["usr/lib/os-release", "etc/os-release"];
const DEBIAN_VERSION: &str = "etc/debian_version";
const ALPINE_RELEASE: &str = "etc/alpine-release";

/// 릴리스 파일 크기 상한
const MAX_RELEASE_FILE_SIZE: u64 = 64 * 1024;

/// 유니버스에 있는 릴리스 파일로 OS 정보를 구성합니다.
///
/// 읽을 수 있는 파일이 하나도 없으면 `None`입니다.
pub fn detect(root: &Path, universe: &FileSet) -> Option<OsInfo> {
    let mut info = OsInfo::default();
    let read = |rel: &str| -> Option<String> {
        if !universe.contains(rel) {
            return None;
        }
        match read_text_capped(root, rel, MAX_RELEASE_FILE_SIZE) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(path = rel, error = %e, "release file unreadable");
                None
            }
        }
    };

    for rel in OS_RELEASE_FILES.iter().copied() {
        if let Some(text) = read(rel) {
            apply_os_release(&mut info, &text);
        }
    }

    if let Some(text) = read(DEBIAN_VERSION) {
        apply_debian_version(&mut info, &text);
    }

    if let Some(text) = read(ALPINE_RELEASE) {
        let version = text.trim();
        if !version.is_empty() {
            info.version_id.get_or_insert_with(|| version.to_owned());
            info.name.get_or_insert_with(|| "Alpine Linux".to_owned());
        }
    }

    if info.is_empty() {
        debug!("no os release information found");
        None
    } else {
        debug!(os = %info, "os identified");
        Some(info)
    }
}

/// `KEY=value` 형식의 os-release 내용을 반영합니다.
///
/// 따옴표는 벗기고 주석과 형식이 맞지 않는 줄은 무시합니다.
pub fn apply_os_release(info: &mut OsInfo, text: &str) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_owned();
        if value.is_empty() {
            continue;
        }
        let slot = match key.trim() {
            "NAME" => &mut info.name,
            "VERSION" => &mut info.version,
            "VERSION_ID" => &mut info.version_id,
            "VERSION_CODENAME" => &mut info.codename,
            "CPE_NAME" => &mut info.cpe,
            "PRETTY_NAME" => &mut info.pretty_name,
            _ => continue,
        };
        *slot = Some(value);
    }
}

/// `etc/debian_version` 내용을 반영합니다.
///
/// `12.4`처럼 숫자로 시작하면 버전, `trixie/sid`처럼 이름이면 코드명입니다.
fn apply_debian_version(info: &mut OsInfo, text: &str) {
    let value = text.trim().split('/').next().unwrap_or_default();
    if value.is_empty() {
        return;
    }
    if value.starts_with(|c: char| c.is_ascii_digit()) {
        info.version_id.get_or_insert_with(|| value.to_owned());
    } else {
        info.codename.get_or_insert_with(|| value.to_owned());
    }
    info.name.get_or_insert_with(|| "Debian GNU/Linux".to_owned());
}
