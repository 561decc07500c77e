//! 바이너리 문자열 버전 탐지 추출기 (opt-in)
//!
//! ELF 실행 파일에서 출력 가능한 ASCII 문자열을 뽑아 잘 알려진 런타임과
//! 라이브러리의 버전 배너를 찾습니다. 비용이 크므로 `analyze_binaries`가
//! 켜졌을 때만 마지막 순서로 실행됩니다.
//!
//! | 패턴 | 패키지 | 작성자 |
//! |------|--------|--------|
//! | `GCC: (...) x.y.z` | gcc | gnu |
//! | `gcc x.y.z` | gcc | gnu |
//! | `OpenSSL x.y.z` | openssl | openssl |
//! | `inflate (...) x.y.z` | zlib | zlib |
//! | `(PostgreSQL) x.y.z` | postgresql | postgresql |
//! | `<파일 이름> [v]x.y.z` | 파일 이름 | - |

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::LayerScanError;
use crate::extractor::{CandidateScope, Extractor, file_name, read_capped};
use crate::ledger::Extraction;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

const VERSION: &str = r"([0-9]+\.[0-9]+\.[0-9]+)";

/// 고정 배너 규칙: (패턴, 패키지 이름, 작성자)
const BANNERS: &[(&str, &str, &str)] = &[
    (r"GCC:\s\(.*\)\s", "gcc", "gnu"),
    (r"gcc\s", "gcc", "gnu"),
    (r"OpenSSL\s", "openssl", "openssl"),
    (r"inflate\s\(.*\)\s", "zlib", "zlib"),
    (r"\(PostgreSQL\)\s", "postgresql", "postgresql"),
];

static BANNER_RULES: LazyLock<Vec<BannerRule>> = LazyLock::new(|| {
    BANNERS
        .iter()
        .map(|&(prefix, name, author)| BannerRule {
            pattern: Regex::new(&format!("{prefix}{VERSION}")).expect("valid banner pattern"),
            name,
            author,
        })
        .collect()
});

/// 파일 이름 바로 뒤에 오는 버전
static SELF_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s(v?[0-9]+\.[0-9]+\.[0-9]+)").expect("valid self-version pattern")
});

/// 바이너리 문자열 추출기
pub struct BinaryStringsExtractor {
    max_size: u64,
    min_len: usize,
}

struct BannerRule {
    pattern: Regex,
    name: &'static str,
    author: &'static str,
}

impl BinaryStringsExtractor {
    /// 파일 크기 상한과 최소 문자열 길이로 추출기를 생성합니다.
    pub fn new(max_size: u64, min_len: usize) -> Self {
        Self { max_size, min_len }
    }
}

impl Extractor for BinaryStringsExtractor {
    fn name(&self) -> &'static str {
        "binary-strings"
    }

    fn scope(&self) -> CandidateScope {
        CandidateScope::Executables
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let printable = regex::bytes::Regex::new(&format!("[\\x20-\\x7E]{{{},}}", self.min_len))
            .map_err(|e| LayerScanError::ExtractorFailed {
                extractor: self.name().to_owned(),
                reason: format!("invalid pattern: {e}"),
            })?;
        let mut extraction = Extraction::new();

        for path in candidates {
            let data = match read_capped(root, path, self.max_size) {
                Ok(data) => data,
                Err(e) => {
                    extraction.skip(path, e);
                    continue;
                }
            };
            let strings = printable_strings(&printable, &data);

            let mut found = Vec::new();
            for rule in BANNER_RULES.iter() {
                if let Some(version) = first_capture(&rule.pattern, &strings) {
                    found.push(
                        PackageIdentity::new(rule.name, Some(version), Ecosystem::Unknown)
                            .with_author(Some(rule.author.to_owned())),
                    );
                }
            }

            let binary = file_name(path).trim();
            if binary.len() > 1 {
                if let Some(version) = self_version(binary, &strings) {
                    found.push(PackageIdentity::new(binary, Some(version), Ecosystem::Unknown));
                }
            }

            if !found.is_empty() {
                debug!(path = %path, packages = found.len(), "version banners found");
            }
            for identity in found {
                extraction.add(identity, [path.as_str()]);
            }
        }

        Ok(extraction)
    }
}

/// 출력 가능한 ASCII 문자열을 등장 순서대로 추출합니다.
pub fn printable_strings<'a>(pattern: &regex::bytes::Regex, data: &'a [u8]) -> Vec<&'a str> {
    pattern
        .find_iter(data)
        .filter_map(|m| std::str::from_utf8(m.as_bytes()).ok())
        .collect()
}

/// 처음으로 일치하는 문자열의 첫 캡처 그룹
fn first_capture(pattern: &Regex, strings: &[&str]) -> Option<String> {
    strings
        .iter()
        .find_map(|s| pattern.captures(s)?.get(1).map(|m| m.as_str().to_owned()))
}

/// `<이름> [v]x.y.z` 형태에서 이름 뒤의 버전
fn self_version(binary: &str, strings: &[&str]) -> Option<String> {
    strings.iter().find_map(|s| {
        s.match_indices(binary).find_map(|(at, _)| {
            let rest = &s[at + binary.len()..];
            SELF_VERSION.captures(rest)?.get(1).map(|m| m.as_str().to_owned())
        })
    })
}
