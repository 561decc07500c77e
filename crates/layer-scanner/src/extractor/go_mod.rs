//! Go 모듈 매니페스트 추출기
//!
//! `go.mod`의 `go` 지시문은 툴체인 패키지 `go@<ver>`로,
//! `require` 항목은 모듈 패키지로 기록합니다. 모두 `go.mod` 파일 자체를 소유합니다.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LayerScanError;
use crate::extractor::{Extractor, read_text_capped};
use crate::ledger::Extraction;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

static GO_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^go\s+(\d+\.\d+)").expect("valid go directive pattern")
});
static REQUIRE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)require\s+\(\s*([^)]*)\s*\)").expect("valid require block pattern")
});
static SINGLE_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^require\s+([^\s(]+)\s+([^\s]+)").expect("valid single require pattern")
});

/// go.mod 추출기
pub struct GoModExtractor {
    max_size: u64,
}

impl GoModExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

impl Extractor for GoModExtractor {
    fn name(&self) -> &'static str {
        "go-mod"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        for path in candidates
            .iter()
            .filter(|p| *p == "go.mod" || p.ends_with("/go.mod"))
        {
            let text = match read_text_capped(root, path, self.max_size) {
                Ok(text) => text,
                Err(e) => {
                    extraction.skip(path, e);
                    continue;
                }
            };

            if let Some(version) = GO_VERSION.captures(&text).and_then(|c| c.get(1)) {
                let toolchain = PackageIdentity::new(
                    "go",
                    Some(version.as_str().to_owned()),
                    Ecosystem::Golang,
                );
                extraction.add(toolchain, [path.as_str()]);
            }

            for block in REQUIRE_BLOCK.captures_iter(&text).filter_map(|c| c.get(1)) {
                for line in block.as_str().lines() {
                    // 행 끝 주석 (`// indirect`) 제거
                    let line = line.split("//").next().unwrap_or_default();
                    let tokens: Vec<&str> = line.split_whitespace().collect();
                    if let [module, version] = tokens.as_slice() {
                        let identity = PackageIdentity::new(
                            *module,
                            Some((*version).to_owned()),
                            Ecosystem::Golang,
                        );
                        extraction.add(identity, [path.as_str()]);
                    }
                }
            }

            for caps in SINGLE_REQUIRE.captures_iter(&text) {
                let (Some(module), Some(version)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                extraction.add(
                    PackageIdentity::new(
                        module.as_str(),
                        Some(version.as_str().to_owned()),
                        Ecosystem::Golang,
                    ),
                    [path.as_str()],
                );
            }
        }

        Ok(extraction)
    }
}
