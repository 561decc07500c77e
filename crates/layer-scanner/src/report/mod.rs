//! 보고서 생성과 저장
//!
//! [`LayeredInventory`]를 CSV, JSON, SPDX 2.3, 실행 요약 로그로 내보냅니다.
//! 각 형식의 문자열 생성은 하위 모듈이 담당하고, [`ReportWriter`]는
//! 출력 디렉토리에 파일을 씁니다.
//!
//! 파일 이름은 이미지 이름을 [`util::file_safe_name`]으로 바꾼 값을 기준으로 합니다.
//!
//! | 형식 | 파일 |
//! |------|------|
//! | CSV | `<name>.csv` |
//! | JSON | `<name>.json` |
//! | SPDX | `<name>.spdx.json` |
//! | 실행 요약 | `<name>.log.json` |

pub mod csv;
pub mod json;
pub mod spdx;
pub mod summary;
pub mod util;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::LayerScanError;
use crate::inventory::LayeredInventory;

pub use summary::RunLog;

/// 저장할 보고서 형식 선택
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSelection {
    /// CSV 패키지 목록
    pub csv: bool,
    /// 레이어별 JSON
    pub json: bool,
    /// SPDX 문서
    pub spdx: bool,
}

impl Default for ReportSelection {
    fn default() -> Self {
        Self {
            csv: false,
            json: false,
            spdx: true,
        }
    }
}

impl ReportSelection {
    /// 코어 출력 설정에서 선택을 만듭니다.
    pub fn from_core(output: &strata_core::config::OutputConfig) -> Self {
        Self {
            csv: output.csv,
            json: output.json,
            spdx: output.spdx,
        }
    }
}

/// 출력 디렉토리에 보고서를 저장합니다.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    image: String,
}

impl ReportWriter {
    /// 출력 디렉토리와 이미지 이름으로 작성기를 만듭니다.
    pub fn new(dir: impl Into<PathBuf>, image: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            image: image.into(),
        }
    }

    /// 출력 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 선택된 보고서와 실행 요약 로그를 저장하고, 쓴 파일 경로를 반환합니다.
    pub fn write_all(
        &self,
        inventory: &LayeredInventory,
        selection: ReportSelection,
        elapsed: Duration,
    ) -> Result<Vec<PathBuf>, LayerScanError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| LayerScanError::io(self.dir.display().to_string(), e))?;

        let mut written = Vec::new();
        if selection.csv {
            written.push(self.write("csv", &csv::to_csv(inventory.packages()))?);
        }
        if selection.json {
            written.push(self.write("json", &json::inventory_to_json(inventory)?)?);
        }
        if selection.spdx {
            written.push(self.write("spdx.json", &spdx::generate(inventory, &self.image)?)?);
        }
        let log = RunLog::new(inventory, &self.image, elapsed);
        written.push(self.write("log.json", &log.to_json()?)?);

        info!(
            dir = %self.dir.display(),
            files = written.len(),
            "reports written"
        );
        Ok(written)
    }

    fn write(&self, extension: &str, content: &str) -> Result<PathBuf, LayerScanError> {
        let path = self
            .dir
            .join(format!("{}.{extension}", util::file_safe_name(&self.image)));
        std::fs::write(&path, content)
            .map_err(|e| LayerScanError::io(path.display().to_string(), e))?;
        Ok(path)
    }
}
