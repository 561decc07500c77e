//! 다중 레이어 병합 -- 레이어별 원장을 하나의 인벤토리로 합칩니다.
//!
//! [`LayeredInventory`]는 레이어 순서를 유지한 원장 목록과 그로부터 파생된
//! 전역 패키지 집합을 가집니다. 병합 규칙은 다음과 같습니다.
//!
//! - 전역 패키지 집합은 각 레이어 `package_files` 키의 합집합입니다.
//!   여섯 필드가 모두 같은 식별자만 하나로 합쳐집니다.
//! - 파일 출처는 `(패키지, 레이어, 경로)` 삼중항으로 유지되므로 두 레이어에
//!   같은 상대 경로가 있어도 서로 다른 파일 노드가 됩니다.
//! - OS 정보는 나중 레이어가 이깁니다. 두 레이어의 값이 다르면 경고를 남깁니다.
//!
//! 인벤토리는 모든 레이어 스캔이 끝난 뒤 한 번 만들어지고 이후 읽기 전용입니다.

use std::collections::BTreeSet;

use metrics::gauge;
use serde::Serialize;
use strata_core::metrics as m;
use tracing::{info, warn};

use crate::ledger::{Ledger, ScanSummary};
use crate::types::{FileSet, LayerId, OsInfo, PackageIdentity};

/// 병합에서 빠진 레이어
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerFailure {
    /// 레이어 식별자
    pub layer: LayerId,
    /// 실패 사유
    pub reason: String,
}

/// "패키지가 파일을 포함한다" 관계 하나
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attribution<'a> {
    /// 패키지
    pub package: &'a PackageIdentity,
    /// 파일이 속한 레이어
    pub layer: &'a str,
    /// 레이어 기준 상대 경로
    pub path: &'a str,
}

impl Attribution<'_> {
    /// 레이어로 한정된 파일 식별자
    pub fn qualified_path(&self) -> String {
        qualified_path(self.layer, self.path)
    }
}

/// 레이어로 한정된 파일 식별자 `<layer>/<path>`
pub fn qualified_path(layer: &str, path: &str) -> String {
    format!("{layer}/{path}")
}

/// 레이어별 원장과 전역 패키지 집합
#[derive(Debug, Clone, Default)]
pub struct LayeredInventory {
    layers: Vec<(LayerId, Ledger)>,
    packages: BTreeSet<PackageIdentity>,
    os_info: Option<OsInfo>,
    failures: Vec<LayerFailure>,
}

impl LayeredInventory {
    /// 빈 인벤토리를 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 레이어 순서대로 원장을 병합합니다.
    pub fn merge<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = (LayerId, Ledger)>,
    {
        let mut inventory = Self::new();
        for (id, ledger) in layers {
            inventory.add_layer(id, ledger);
        }
        inventory
    }

    /// 레이어 하나를 뒤에 추가합니다.
    ///
    /// 같은 식별자의 레이어가 이미 있으면 그 자리의 원장을 교체하고
    /// 파생 정보를 처음부터 다시 계산합니다.
    pub fn add_layer(&mut self, id: impl Into<LayerId>, ledger: Ledger) {
        let id = id.into();

        if let Some(slot) = self.layers.iter_mut().find(|(existing, _)| *existing == id) {
            warn!(layer = %id, "duplicate layer id, replacing earlier ledger");
            slot.1 = ledger;
            self.rebuild();
        } else {
            self.absorb(&id, &ledger);
            self.layers.push((id, ledger));
        }

        gauge!(m::INVENTORY_PACKAGES).set(self.packages.len() as f64);
    }

    /// 스캔에 실패해 병합되지 못한 레이어를 기록합니다.
    pub fn record_failure(&mut self, layer: impl Into<LayerId>, reason: impl Into<String>) {
        let failure = LayerFailure {
            layer: layer.into(),
            reason: reason.into(),
        };
        warn!(layer = %failure.layer, reason = %failure.reason, "layer excluded from inventory");
        self.failures.push(failure);
    }

    /// 레이어 순서의 (식별자, 원장) 목록
    pub fn layers(&self) -> &[(LayerId, Ledger)] {
        &self.layers
    }

    /// 식별자로 레이어 원장을 찾습니다.
    pub fn layer(&self, id: &str) -> Option<&Ledger> {
        self.layers
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, ledger)| ledger)
    }

    /// 전역 패키지 집합
    pub fn packages(&self) -> &BTreeSet<PackageIdentity> {
        &self.packages
    }

    /// 병합된 OS 정보
    pub fn os_info(&self) -> Option<&OsInfo> {
        self.os_info.as_ref()
    }

    /// 병합에서 빠진 레이어
    pub fn failures(&self) -> &[LayerFailure] {
        &self.failures
    }

    /// 모든 `(패키지, 레이어, 경로)` 귀속 관계를 레이어 순서로 돌려줍니다.
    pub fn relations(&self) -> impl Iterator<Item = Attribution<'_>> {
        self.layers.iter().flat_map(|(layer, ledger)| {
            ledger
                .package_files()
                .iter()
                .flat_map(move |(package, files)| {
                    files.iter().map(move |path| Attribution {
                        package,
                        layer: layer.as_str(),
                        path: path.as_str(),
                    })
                })
        })
    }

    /// 패키지의 레이어별 파일 목록
    ///
    /// 패키지를 가진 레이어만 레이어 순서대로 포함됩니다.
    pub fn files_for<'a>(&'a self, package: &PackageIdentity) -> Vec<(&'a str, &'a FileSet)> {
        self.layers
            .iter()
            .filter_map(|(layer, ledger)| {
                ledger
                    .files_of(package)
                    .map(|files| (layer.as_str(), files))
            })
            .collect()
    }

    /// 관계 `(패키지, 레이어, 경로)`가 존재하는지 확인합니다.
    pub fn contains(&self, package: &PackageIdentity, layer: &str, path: &str) -> bool {
        self.layer(layer)
            .and_then(|ledger| ledger.files_of(package))
            .is_some_and(|files| files.contains(path))
    }

    /// 모든 레이어 요약의 합계
    pub fn summary(&self) -> ScanSummary {
        let mut total = self
            .layers
            .iter()
            .map(|(_, ledger)| ledger.summary())
            .fold(ScanSummary::default(), |mut acc, s| {
                acc.total_files += s.total_files;
                acc.attributed_files += s.attributed_files;
                acc.remaining_files += s.remaining_files;
                acc.diagnostics += s.diagnostics;
                acc
            });
        total.packages = self.packages.len();
        total
    }

    fn absorb(&mut self, id: &str, ledger: &Ledger) {
        self.packages.extend(ledger.packages().cloned());

        if let Some(os) = ledger.os_info() {
            if let Some(previous) = &self.os_info {
                if previous != os {
                    warn!(
                        layer = %id,
                        previous = %previous,
                        current = %os,
                        "layers disagree on os identity, keeping the later one"
                    );
                }
            }
            self.os_info = Some(os.clone());
        }

        info!(
            layer = %id,
            layer_packages = ledger.package_files().len(),
            total_packages = self.packages.len(),
            "layer merged"
        );
    }

    fn rebuild(&mut self) {
        self.packages.clear();
        self.os_info = None;
        let layers = std::mem::take(&mut self.layers);
        for (id, ledger) in &layers {
            self.absorb(id, ledger);
        }
        self.layers = layers;
    }
}
