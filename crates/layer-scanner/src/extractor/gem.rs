//! Ruby gemspec 추출기
//!
//! `*.gemspec` 안의 `Gem::Specification.new do ... end` 블록마다
//! `.name`과 `.version` 할당을 읽습니다. 둘 중 하나라도 없으면 블록을 버립니다.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LayerScanError;
use crate::extractor::{Extractor, read_text_capped};
use crate::ledger::Extraction;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

static SPEC_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Gem::Specification\.new do (.+?)end").expect("valid gemspec block pattern")
});
static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.name\s*=\s*["']([^"']+)["']"#).expect("valid gemspec name pattern")
});
static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.version\s*=\s*["']([^"']+)["']"#).expect("valid gemspec version pattern")
});

/// gemspec 추출기
pub struct GemExtractor {
    max_size: u64,
}

impl GemExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

impl Extractor for GemExtractor {
    fn name(&self) -> &'static str {
        "gem"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        for path in candidates.iter().filter(|p| p.ends_with(".gemspec")) {
            let text = match read_text_capped(root, path, self.max_size) {
                Ok(text) => text,
                Err(e) => {
                    extraction.skip(path, e);
                    continue;
                }
            };

            for block in SPEC_BLOCK.captures_iter(&text).filter_map(|c| c.get(1)) {
                let block = block.as_str();
                let name = NAME.captures(block).and_then(|c| c.get(1));
                let version = VERSION.captures(block).and_then(|c| c.get(1));
                if let (Some(name), Some(version)) = (name, version) {
                    extraction.add(
                        PackageIdentity::new(
                            name.as_str(),
                            Some(version.as_str().to_owned()),
                            Ecosystem::Gem,
                        ),
                        [path.as_str()],
                    );
                }
            }
        }

        Ok(extraction)
    }
}
