//! 실행 요약 로그
//!
//! 레이어 간 중복을 제거한 수치와 중복을 포함한 수치를 함께 기록합니다.
//! 경로 중복 제거는 레이어를 무시한 상대 경로 기준입니다.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;

use super::util;
use crate::error::LayerScanError;
use crate::inventory::LayeredInventory;

/// 스캔 한 번의 실행 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunLog {
    /// 귀속된 고유 경로 수
    pub analyzed_files: usize,
    /// 레이어별 귀속 파일 수의 합
    pub analyzed_files_duplicates: usize,
    /// 컨테이너 이미지 이름
    pub container: String,
    /// 파일 이름으로 쓸 수 있게 바꾼 이미지 이름
    pub container_usable_name: String,
    /// 고유 경로 수
    pub total_files: usize,
    /// 레이어별 유니버스 크기의 합
    pub total_files_duplicates: usize,
    /// 경과 시간 (밀리초)
    pub elapsed_time: u64,
}

impl RunLog {
    /// 인벤토리와 경과 시간으로 요약을 만듭니다.
    pub fn new(inventory: &LayeredInventory, image: &str, elapsed: Duration) -> Self {
        let mut analyzed: BTreeSet<&str> = BTreeSet::new();
        let mut total: BTreeSet<&str> = BTreeSet::new();
        let mut analyzed_dup = 0;
        let mut total_dup = 0;

        for (_, ledger) in inventory.layers() {
            analyzed_dup += ledger.attributed().len();
            total_dup += ledger.universe().len();
            analyzed.extend(ledger.attributed().iter().map(String::as_str));
            total.extend(ledger.universe().iter().map(String::as_str));
        }

        Self {
            analyzed_files: analyzed.len(),
            analyzed_files_duplicates: analyzed_dup,
            container: image.to_owned(),
            container_usable_name: util::file_safe_name(image),
            total_files: total.len(),
            total_files_duplicates: total_dup,
            elapsed_time: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// JSON으로 직렬화합니다.
    pub fn to_json(&self) -> Result<String, LayerScanError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LayerScanError::Report(format!("run log serialization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::types::{Ecosystem, FileSet, PackageIdentity};

    fn layer(files: &[&str], claimed: &str) -> Ledger {
        let universe: FileSet = files.iter().map(|s| (*s).to_owned()).collect();
        let mut ledger = Ledger::new(universe);
        ledger.claim(
            PackageIdentity::new("bash", Some("5.2".into()), Ecosystem::Debian),
            [claimed],
        );
        ledger
    }

    #[test]
    fn counts_unique_and_duplicate_paths() {
        let inventory = LayeredInventory::merge([
            ("l1".to_owned(), layer(&["bin/bash", "etc/motd"], "bin/bash")),
            ("l2".to_owned(), layer(&["bin/bash", "etc/hosts"], "bin/bash")),
        ]);
        let log = RunLog::new(&inventory, "debian:12", Duration::from_millis(1500));
        assert_eq!(log.analyzed_files, 1);
        assert_eq!(log.analyzed_files_duplicates, 2);
        assert_eq!(log.total_files, 3);
        assert_eq!(log.total_files_duplicates, 4);
        assert_eq!(log.container_usable_name, "debiantwodots12");
        assert_eq!(log.elapsed_time, 1500);

        let value: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(value["container"], "debian:12");
    }
}
