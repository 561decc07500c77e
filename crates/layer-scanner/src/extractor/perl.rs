//! Perl 모듈 추출기
//!
//! perl 경로 아래 `*.pm` 파일에서 `package` 선언과 `$VERSION` 할당을 찾습니다.
//! 세 단계 이상 중첩된 패키지(`A::B::C`)는 하위 모듈로 보고 무시합니다.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LayerScanError;
use crate::extractor::{Extractor, read_text_capped};
use crate::ledger::Extraction;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

static PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"package\s+([^\s;]+)").expect("valid package pattern")
});
static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$VERSION\s*=\s*'([^']+)'").expect("valid $VERSION pattern")
});
const MAX_NAMESPACE_DEPTH: usize = 3;

/// Perl 추출기
pub struct PerlExtractor {
    max_size: u64,
}

impl PerlExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

impl Extractor for PerlExtractor {
    fn name(&self) -> &'static str {
        "perl"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        for path in candidates
            .iter()
            .filter(|p| p.ends_with(".pm") && p.contains("perl"))
        {
            let text = match read_text_capped(root, path, self.max_size) {
                Ok(text) => text,
                Err(e) => {
                    extraction.skip(path, e);
                    continue;
                }
            };

            let Some(package) = PACKAGE.captures(&text).and_then(|c| c.get(1)) else {
                continue;
            };
            let Some(version) = VERSION.captures(&text).and_then(|c| c.get(1)) else {
                continue;
            };
            let package = package.as_str();
            if package.split("::").count() >= MAX_NAMESPACE_DEPTH {
                continue;
            }

            extraction.add(
                PackageIdentity::new(package, Some(version.as_str().to_owned()), Ecosystem::Perl),
                [path.as_str()],
            );
        }

        Ok(extraction)
    }
}
