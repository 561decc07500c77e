//! Go 바이너리 build info 추출기
//!
//! Go 1.18 이상이 바이너리에 심는 build info 블롭을 직접 파싱합니다.
//!
//! # 블롭 형식
//!
//! ```text
//! +0   "\xff Go buildinf:" (14 bytes)
//! +14  pointer size
//! +15  flags (0x2 = inline strings)
//! +32  uvarint len | go version
//!      uvarint len | modinfo
//! ```
//!
//! modinfo는 16바이트 센티널로 감싸져 있으며 줄 단위 탭 구분 레코드입니다
//! (`path`, `mod`, `dep`, `=>`, `build`).

use std::path::Path;

use tracing::debug;

use crate::error::LayerScanError;
use crate::extractor::{CandidateScope, Extractor, read_capped};
use crate::ledger::Extraction;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

const BUILDINFO_MAGIC: &[u8] = b"\xff Go buildinf:";
const BUILDINFO_HEADER_LEN: usize = 32;
const FLAG_INLINE_STRINGS: u8 = 0x2;
const SENTINEL_LEN: usize = 16;
const VERSION_LDFLAG: &str = "/version.Version=";

/// Go 바이너리 추출기
pub struct GoBinaryExtractor {
    max_size: u64,
}

impl GoBinaryExtractor {
    /// 바이너리 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

/// 바이너리에서 읽은 build info
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildInfo {
    /// Go 툴체인 버전 (`go` 접두 제거)
    pub go_version: String,
    /// `(module path, version)` 목록
    pub modules: Vec<(String, String)>,
}

/// build info 파싱 결과
#[derive(Debug, PartialEq, Eq)]
pub enum BuildInfoResult {
    /// 파싱 성공
    Found(BuildInfo),
    /// 1.18 이전 포인터 형식
    Legacy,
    /// build info 없음 (Go 바이너리가 아님)
    Absent,
}

impl Extractor for GoBinaryExtractor {
    fn name(&self) -> &'static str {
        "go-binary"
    }

    fn scope(&self) -> CandidateScope {
        CandidateScope::Executables
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        for path in candidates {
            let data = match read_capped(root, path, self.max_size) {
                Ok(data) => data,
                Err(e) => {
                    extraction.skip(path, e);
                    continue;
                }
            };

            match parse_buildinfo(&data) {
                BuildInfoResult::Found(info) => {
                    debug!(
                        path = %path,
                        go = %info.go_version,
                        modules = info.modules.len(),
                        "go build info"
                    );
                    extraction.add(
                        PackageIdentity::new("stdlib", Some(info.go_version), Ecosystem::Golang),
                        [path.as_str()],
                    );
                    for (module, version) in info.modules {
                        extraction.add(
                            PackageIdentity::new(module, Some(version), Ecosystem::Golang),
                            [path.as_str()],
                        );
                    }
                }
                BuildInfoResult::Legacy => {
                    extraction.skip(path, "go binary too old to be analyzed (pre-1.18 build info)");
                }
                BuildInfoResult::Absent => {}
            }
        }

        Ok(extraction)
    }
}

/// 바이트열에서 Go build info를 찾아 파싱합니다.
pub fn parse_buildinfo(data: &[u8]) -> BuildInfoResult {
    let Some(start) = find(data, BUILDINFO_MAGIC) else {
        return BuildInfoResult::Absent;
    };
    let header = &data[start..];
    if header.len() < BUILDINFO_HEADER_LEN {
        return BuildInfoResult::Absent;
    }
    if header[15] & FLAG_INLINE_STRINGS == 0 {
        return BuildInfoResult::Legacy;
    }

    let mut cursor = &header[BUILDINFO_HEADER_LEN..];
    let Some(version) = read_string(&mut cursor) else {
        return BuildInfoResult::Absent;
    };
    let modinfo = read_string(&mut cursor).unwrap_or_default();

    let go_version = version
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_start_matches("go")
        .to_owned();

    BuildInfoResult::Found(BuildInfo {
        go_version,
        modules: parse_modinfo(strip_sentinels(&modinfo)),
    })
}

/// modinfo 텍스트에서 모듈 목록을 추출합니다.
fn parse_modinfo(modinfo: &str) -> Vec<(String, String)> {
    let mut modules = Vec::new();

    for line in modinfo.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.first().copied() {
            Some("mod" | "dep" | "=>") => {
                if fields.len() >= 3 && !fields[1].is_empty() && !fields[2].is_empty() {
                    modules.push((fields[1].to_owned(), fields[2].to_owned()));
                } else {
                    debug!(line, "unparseable go module line");
                }
            }
            Some("build") => {
                if let Some(value) = fields.get(1) {
                    modules.extend(parse_version_ldflags(value));
                }
            }
            _ => {}
        }
    }

    modules
}

/// `-X <module>/version.Version=<ver>` 링커 플래그에서 모듈 버전을 읽습니다.
fn parse_version_ldflags(setting: &str) -> Vec<(String, String)> {
    setting
        .split("-X ")
        .skip(1)
        .filter_map(|flag| {
            let assignment = flag.split_whitespace().next()?;
            let (module, version) = assignment.split_once(VERSION_LDFLAG)?;
            let version = version.trim_matches(|c| c == '"' || c == '\'');
            (!module.is_empty() && !version.is_empty())
                .then(|| (module.to_owned(), version.to_owned()))
        })
        .collect()
}

fn strip_sentinels(modinfo: &str) -> &str {
    let bytes = modinfo.as_bytes();
    if bytes.len() > 2 * SENTINEL_LEN && bytes[bytes.len() - SENTINEL_LEN - 1] == b'\n' {
        modinfo
            .get(SENTINEL_LEN..bytes.len() - SENTINEL_LEN)
            .unwrap_or(modinfo)
    } else {
        modinfo
    }
}

fn read_string(cursor: &mut &[u8]) -> Option<String> {
    let len = usize::try_from(read_uvarint(cursor)?).ok()?;
    if cursor.len() < len {
        return None;
    }
    let (s, rest) = cursor.split_at(len);
    *cursor = rest;
    Some(String::from_utf8_lossy(s).into_owned())
}

fn read_uvarint(cursor: &mut &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    for (i, &b) in cursor.iter().enumerate().take(10) {
        value |= u64::from(b & 0x7f) << (7 * i);
        if b & 0x80 == 0 {
            *cursor = &cursor[i + 1..];
            return Some(value);
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
