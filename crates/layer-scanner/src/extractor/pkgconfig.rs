//! pkg-config 메타데이터 추출기
//!
//! `pkgconfig` 디렉토리 아래 `*.pc` 파일의 `Name:`/`Version:` 속성을 읽습니다.
//! 같은 파일 이름은 처음 본 경로 하나만 사용합니다.
//! 버전에 `.`이 없으면 `abiver` 변수로 대체합니다.
//! `libdir` 아래에서 `Libs:`의 `-l<name>`에 해당하는 `lib<name>.*` 파일도 소유합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::debug;

use crate::error::LayerScanError;
use crate::extractor::{Extractor, file_name, files_under, read_text_capped};
use crate::ledger::Extraction;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

/// 변수 확장 최대 깊이
const MAX_EXPANSION_DEPTH: usize = 16;

/// 파싱된 `.pc` 파일
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PcFile {
    /// `key=value` 변수 (확장 완료)
    pub variables: BTreeMap<String, String>,
    /// `Key: value` 속성 (키는 소문자, 확장 완료)
    pub properties: BTreeMap<String, String>,
}

impl PcFile {
    /// 속성 값
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// 변수 값
    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }
}

/// pkg-config 추출기
pub struct PkgConfigExtractor {
    max_size: u64,
}

impl PkgConfigExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

impl Extractor for PkgConfigExtractor {
    fn name(&self) -> &'static str {
        "pkg-config"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();
        let mut seen_names = BTreeSet::new();

        for path in candidates
            .iter()
            .filter(|p| p.contains("pkgconfig") && p.ends_with(".pc"))
        {
            if !seen_names.insert(file_name(path)) {
                continue;
            }

            let text = match read_text_capped(root, path, self.max_size) {
                Ok(text) => text,
                Err(e) => {
                    extraction.skip(path, e);
                    continue;
                }
            };
            let pc = match parse_pc(&text) {
                Ok(pc) => pc,
                Err(reason) => {
                    debug!(path = %path, reason = %reason, "unparseable pc file");
                    extraction.skip(path, reason);
                    continue;
                }
            };

            let Some(name) = pc.property("name").filter(|n| !n.is_empty()) else {
                extraction.skip(path, "missing Name property");
                continue;
            };
            let version = match pc.property("version") {
                Some(v) if v.contains('.') => Some(v.to_owned()),
                _ => pc.variable("abiver").map(str::to_owned),
            };

            let mut files = vec![path.clone()];
            if let Some(libdir) = pc.variable("libdir") {
                let prefixes = library_prefixes(&pc);
                files.extend(
                    files_under(candidates, libdir.trim_matches('/'))
                        .filter(|f| {
                            let name = file_name(f);
                            prefixes.iter().any(|p| name.starts_with(p.as_str()))
                        })
                        .cloned(),
                );
            }

            extraction.add(
                PackageIdentity::new(name, version, Ecosystem::Unknown),
                files,
            );
        }

        Ok(extraction)
    }
}

/// `.pc` 텍스트를 파싱하고 `${var}` 참조를 확장합니다.
///
/// `=`가 `:`보다 먼저 나오는 줄은 변수, 그 반대는 속성입니다.
/// 정의되지 않은 변수 참조나 순환 참조는 에러입니다.
pub fn parse_pc(text: &str) -> Result<PcFile, String> {
    let mut raw_vars: Vec<(String, String)> = Vec::new();
    let mut raw_props: Vec<(String, String)> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let eq = line.find('=');
        let colon = line.find(':');
        match (eq, colon) {
            (Some(e), Some(c)) if e < c => push_pair(&mut raw_vars, line, e),
            (Some(e), None) => push_pair(&mut raw_vars, line, e),
            (_, Some(c)) => push_pair(&mut raw_props, line, c),
            (None, None) => {
                return Err(format!(
                    "line {}: expected key=value or Key: value",
                    lineno + 1
                ));
            }
        }
    }

    let mut pc = PcFile::default();
    for (key, value) in raw_vars {
        let expanded = expand(&value, &pc.variables, 0)?;
        pc.variables.insert(key, expanded);
    }
    for (key, value) in raw_props {
        let expanded = expand(&value, &pc.variables, 0)?;
        pc.properties.insert(key.to_lowercase(), expanded);
    }
    Ok(pc)
}

/// `Libs:`의 `-l<name>` 플래그를 `lib<name>.` 접두사로 바꿉니다.
fn library_prefixes(pc: &PcFile) -> Vec<String> {
    pc.property("libs")
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|flag| flag.strip_prefix("-l"))
        .filter(|lib| !lib.is_empty())
        .map(|lib| format!("lib{lib}."))
        .collect()
}

fn push_pair(out: &mut Vec<(String, String)>, line: &str, at: usize) {
    let key = line[..at].trim().to_owned();
    let value = line[at + 1..].trim().to_owned();
    out.push((key, value));
}

fn expand(value: &str, vars: &BTreeMap<String, String>, depth: usize) -> Result<String, String> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(format!("variable expansion too deep: {value}"));
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(format!("unterminated variable reference: {value}"));
        };
        let key = &after[..end];
        let Some(resolved) = vars.get(key) else {
            return Err(format!("undefined variable: {key}"));
        };
        out.push_str(&expand(resolved, vars, depth + 1)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
