//! Maven 아티팩트 추출기
//!
//! 세 가지 근거를 사용합니다.
//!
//! - 디스크에 풀려 있는 `pom.properties`: 아티팩트 루트 아래 파일 전체를 소유
//! - `*.jar` 아카이브 안의 `pom.properties`: 중첩 jar까지 따라가며 jar 파일을 소유
//! - `*.jar` 파일 이름에서 추론한 좌표: jar 파일을 소유

use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use zip::ZipArchive;

use crate::error::LayerScanError;
use crate::extractor::{
    Extractor, file_name, files_under, parent_dir, read_capped, read_text_capped,
};
use crate::ledger::Extraction;
use crate::normalize::RawPackage;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

/// `name-1.2.3[-classifier]` 형식
static JAR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9\-_]+?)-(\d+\.\d+(?:\.\d+)?)(?:[-_][a-zA-Z0-9\-._]+)?$")
        .expect("valid jar name pattern")
});

/// 중첩 jar를 따라 들어가는 최대 깊이
const MAX_NESTING: usize = 3;

/// Maven 추출기
pub struct JarExtractor {
    max_size: u64,
}

/// jar 파일 이름에서 추론한 좌표
#[derive(Debug, PartialEq, Eq)]
pub struct JarCoordinates {
    /// groupId (없을 수 있음)
    pub group: Option<String>,
    /// artifactId
    pub artifact: String,
    /// 버전
    pub version: String,
}

/// 아카이브 안에서 찾은 `pom.properties` 하나
#[derive(Debug)]
struct EmbeddedPom {
    /// 아카이브 안 위치 (`inner.jar!/META-INF/...`)
    entry: String,
    props: Vec<(String, String)>,
}

impl JarExtractor {
    /// 매니페스트와 아카이브 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    fn read_archive(&self, root: &Path, jar: &str) -> Result<Vec<EmbeddedPom>, LayerScanError> {
        let data = read_capped(root, jar, self.max_size)?;
        let mut poms = Vec::new();
        self.collect_poms(jar, Cursor::new(data), "", 0, &mut poms)?;
        Ok(poms)
    }

    /// 아카이브 항목을 훑어 `pom.properties`를 모읍니다.
    ///
    /// 중첩 jar는 메모리에서 다시 열며, 깨진 중첩 jar는 건너뜁니다.
    fn collect_poms<R: Read + Seek>(
        &self,
        jar: &str,
        reader: R,
        location: &str,
        depth: usize,
        out: &mut Vec<EmbeddedPom>,
    ) -> Result<(), LayerScanError> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| LayerScanError::parse(jar, format!("invalid jar archive: {e}")))?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| LayerScanError::parse(jar, format!("unreadable jar entry: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_owned();
            let nested = name.ends_with(".jar");
            if !nested && !name.ends_with("pom.properties") {
                continue;
            }
            if entry.size() > self.max_size {
                debug!(jar, entry = %name, size = entry.size(), "jar entry over size cap");
                continue;
            }

            let mut data = Vec::new();
            entry
                .by_ref()
                .take(self.max_size)
                .read_to_end(&mut data)
                .map_err(|e| LayerScanError::io(jar, e))?;

            if !nested {
                out.push(EmbeddedPom {
                    entry: format!("{location}{name}"),
                    props: parse_properties(&String::from_utf8_lossy(&data)),
                });
            } else if depth < MAX_NESTING {
                let inner = format!("{location}{name}!/");
                if let Err(e) = self.collect_poms(jar, Cursor::new(data), &inner, depth + 1, out) {
                    debug!(jar, entry = %name, error = %e, "nested jar unreadable");
                }
            }
        }
        Ok(())
    }
}

impl Extractor for JarExtractor {
    fn name(&self) -> &'static str {
        "jar"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        for path in candidates.iter().filter(|p| file_name(p) == "pom.properties") {
            let text = match read_text_capped(root, path, self.max_size) {
                Ok(text) => text,
                Err(e) => {
                    extraction.skip(path, e);
                    continue;
                }
            };
            let Some(identity) = pom_identity(&parse_properties(&text)) else {
                extraction.skip(path, "pom.properties missing groupId/artifactId/version");
                continue;
            };

            let base = artifact_root(path);
            debug!(path = %path, package = %identity, "pom.properties");
            extraction.add_within(identity, files_under(candidates, base).cloned(), candidates);
        }

        for path in candidates.iter().filter(|p| p.ends_with(".jar")) {
            let stem = file_name(path).trim_end_matches(".jar");
            match coordinates_from_name(stem) {
                Some(coords) => {
                    let identity =
                        RawPackage::new(coords.artifact, Some(coords.version), Ecosystem::Maven)
                            .author(coords.group)
                            .normalize();
                    extraction.add(identity, [path.as_str()]);
                }
                None => debug!(path = %path, "jar name carries no version"),
            }

            let poms = match self.read_archive(root, path) {
                Ok(poms) => poms,
                Err(e) => {
                    extraction.skip(path, e);
                    continue;
                }
            };
            for pom in poms {
                match pom_identity(&pom.props) {
                    Some(identity) => {
                        debug!(
                            path = %path,
                            entry = %pom.entry,
                            package = %identity,
                            "embedded pom"
                        );
                        extraction.add(identity, [path.as_str()]);
                    }
                    None => extraction.skip(
                        path,
                        format!("{}: missing groupId/artifactId/version", pom.entry),
                    ),
                }
            }
        }

        Ok(extraction)
    }
}

/// `groupId`, `artifactId`, `version`이 모두 있을 때만 식별자를 만듭니다.
fn pom_identity(props: &[(String, String)]) -> Option<PackageIdentity> {
    let get = |key: &str| props.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    let (group, artifact, version) = (get("groupId")?, get("artifactId")?, get("version")?);
    Some(
        RawPackage::new(artifact, Some(version), Ecosystem::Maven)
            .author(Some(group))
            .normalize(),
    )
}

/// jar 파일 이름(확장자 제외)에서 좌표를 추론합니다.
///
/// - `guava-31.1-jre`처럼 `-`가 여럿이고 `.`이 적으면 이름 패턴을 적용 (groupId = artifactId)
/// - `org.slf4j.slf4j-api-1.7.36`처럼 점 구분이면 버전이 시작되는 조각 앞을 groupId로 사용
pub fn coordinates_from_name(stem: &str) -> Option<JarCoordinates> {
    let dashes = stem.split('-').count();
    let dots = stem.split('.').count();

    if dashes > 2 && dots < 4 {
        let caps = JAR_NAME.captures(stem)?;
        let artifact = caps.get(1)?.as_str().to_owned();
        return Some(JarCoordinates {
            group: Some(artifact.clone()),
            artifact,
            version: caps.get(2)?.as_str().to_owned(),
        });
    }

    let pieces: Vec<&str> = stem.split('.').collect();
    for (idx, piece) in pieces.iter().enumerate() {
        let bytes = piece.as_bytes();
        let n = bytes.len();
        if n <= 2 {
            continue;
        }
        // "name-1" 또는 "name-12"로 끝나는 조각에서 버전이 시작
        let digits = if bytes[n - 2] == b'-' && bytes[n - 1].is_ascii_digit() {
            1
        } else if n > 3
            && bytes[n - 3] == b'-'
            && bytes[n - 2].is_ascii_digit()
            && bytes[n - 1].is_ascii_digit()
        {
            2
        } else {
            continue;
        };

        let group = pieces[..idx].join(".");
        let artifact = &piece[..n - digits - 1];
        let mut version = piece[n - digits..].to_owned();
        for rest in &pieces[idx + 1..] {
            version.push('.');
            version.push_str(rest);
        }
        return Some(JarCoordinates {
            group: (!group.is_empty()).then_some(group),
            artifact: artifact.to_owned(),
            version,
        });
    }
    None
}

/// `META-INF/maven/<g>/<a>/pom.properties`이면 `META-INF` 상위를, 아니면 부모 디렉토리를 반환
fn artifact_root(path: &str) -> &str {
    match path.find("META-INF/") {
        Some(0) => "",
        Some(idx) => path[..idx].trim_end_matches('/'),
        None => parent_dir(path),
    }
}

fn parse_properties(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect()
}
