//! JSON 보고서
//!
//! 패키지 키는 [`PackageIdentity::report_key`] (`name_version_author`)입니다.
//! 아키텍처나 epoch만 다른 식별자는 같은 키로 모이며, 그때 파일 목록은 합쳐집니다.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::LayerScanError;
use crate::inventory::{LayerFailure, LayeredInventory};
use crate::ledger::{Diagnostic, Ledger};
use crate::types::{Ecosystem, OsInfo};

/// 전체 형식의 패키지 항목
#[derive(Debug, Serialize)]
struct PackageEntry<'a> {
    #[serde(rename = "type")]
    ecosystem: Ecosystem,
    list_files: Vec<&'a str>,
}

/// 원장 하나의 전체 보고서
#[derive(Debug, Serialize)]
struct FullReport<'a> {
    package_files: BTreeMap<String, PackageEntry<'a>>,
    analyzed_files: Vec<&'a str>,
    remaining_files: Vec<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    diagnostics: &'a [Diagnostic],
}

#[derive(Debug, Serialize)]
struct LayerReport<'a> {
    id: &'a str,
    #[serde(flatten)]
    report: FullReport<'a>,
}

#[derive(Debug, Serialize)]
struct InventoryReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    os: Option<&'a OsInfo>,
    packages: Vec<String>,
    layers: Vec<LayerReport<'a>>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    failures: &'a [LayerFailure],
}

/// 키별 파일 목록 맵 (`{key: [files]}`)
pub fn package_map(ledger: &Ledger) -> BTreeMap<String, Vec<&str>> {
    let mut merged: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for (identity, files) in ledger.package_files() {
        merged
            .entry(identity.report_key())
            .or_default()
            .extend(files.iter().map(String::as_str));
    }
    merged
        .into_iter()
        .map(|(key, files)| (key, files.into_iter().collect()))
        .collect()
}

/// 원장을 `{key: [files]}` JSON으로 직렬화합니다.
pub fn to_json(ledger: &Ledger) -> Result<String, LayerScanError> {
    serialize(&package_map(ledger))
}

/// 원장을 패키지 유형, 귀속 파일, 미귀속 파일을 포함한 전체 JSON으로 직렬화합니다.
///
/// 스캔 중 남은 진단이 있으면 `diagnostics` 배열로 함께 기록합니다.
pub fn to_json_full(ledger: &Ledger) -> Result<String, LayerScanError> {
    serialize(&full_report(ledger))
}

/// 인벤토리를 레이어별 전체 보고서와 전역 패키지 목록으로 직렬화합니다.
pub fn inventory_to_json(inventory: &LayeredInventory) -> Result<String, LayerScanError> {
    let report = InventoryReport {
        os: inventory.os_info(),
        packages: inventory.packages().iter().map(|p| p.report_key()).collect(),
        layers: inventory
            .layers()
            .iter()
            .map(|(id, ledger)| LayerReport {
                id: id.as_str(),
                report: full_report(ledger),
            })
            .collect(),
        failures: inventory.failures(),
    };
    serialize(&report)
}

fn full_report(ledger: &Ledger) -> FullReport<'_> {
    let mut package_files: BTreeMap<String, PackageEntry<'_>> = BTreeMap::new();
    for (identity, files) in ledger.package_files() {
        let entry = package_files
            .entry(identity.report_key())
            .or_insert_with(|| PackageEntry {
                ecosystem: identity.ecosystem,
                list_files: Vec::new(),
            });
        entry.list_files.extend(files.iter().map(String::as_str));
    }
    for entry in package_files.values_mut() {
        entry.list_files.sort_unstable();
        entry.list_files.dedup();
    }

    FullReport {
        package_files,
        analyzed_files: ledger.attributed().iter().map(String::as_str).collect(),
        remaining_files: ledger.remaining().iter().map(String::as_str).collect(),
        diagnostics: ledger.diagnostics(),
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<String, LayerScanError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| LayerScanError::Report(format!("JSON serialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Extraction;
    use crate::types::{FileSet, PackageIdentity};

    fn sample() -> Ledger {
        let universe: FileSet = ["usr/bin/zstd", "usr/lib/libzstd.so.1", "etc/motd"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut ledger = Ledger::new(universe);
        let amd64 = PackageIdentity::new("zstd", Some("1.5.4".into()), Ecosystem::Debian)
            .with_arch(Some("amd64".into()));
        let arm64 = amd64.clone().with_arch(Some("arm64".into()));
        ledger.claim(amd64, ["usr/bin/zstd"]);
        ledger.claim(arm64, ["usr/lib/libzstd.so.1"]);
        ledger
    }

    #[test]
    fn keys_collapse_and_union_files() {
        let ledger = sample();
        let map = package_map(&ledger);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map["zstd_1.5.4_None"],
            vec!["usr/bin/zstd", "usr/lib/libzstd.so.1"]
        );

        let value: serde_json::Value = serde_json::from_str(&to_json(&ledger).unwrap()).unwrap();
        assert_eq!(value["zstd_1.5.4_None"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn full_form_lists_partition() {
        let value: serde_json::Value =
            serde_json::from_str(&to_json_full(&sample()).unwrap()).unwrap();
        assert_eq!(value["package_files"]["zstd_1.5.4_None"]["type"], "debian");
        assert_eq!(value["analyzed_files"].as_array().unwrap().len(), 2);
        assert_eq!(value["remaining_files"], serde_json::json!(["etc/motd"]));
        assert!(value.get("diagnostics").is_none());
    }

    #[test]
    fn full_form_carries_skipped_candidates() {
        let mut ledger = sample();
        let candidates = ledger.remaining().clone();
        let mut extraction = Extraction::new();
        extraction.skip("etc/motd", "stream did not contain valid UTF-8");
        ledger.claim_all("python", &candidates, extraction, true);

        let value: serde_json::Value =
            serde_json::from_str(&to_json_full(&ledger).unwrap()).unwrap();
        let diagnostics = value["diagnostics"].as_array().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0]["kind"], "candidate_skipped");
        assert_eq!(diagnostics[0]["extractor"], "python");
        assert_eq!(diagnostics[0]["path"], "etc/motd");
        assert_eq!(
            diagnostics[0]["reason"],
            "stream did not contain valid UTF-8"
        );

        let inventory = LayeredInventory::merge([("base".to_owned(), ledger)]);
        let value: serde_json::Value =
            serde_json::from_str(&inventory_to_json(&inventory).unwrap()).unwrap();
        assert_eq!(value["layers"][0]["diagnostics"][0]["path"], "etc/motd");
    }

    #[test]
    fn inventory_form_keeps_layer_order() {
        let mut inventory = LayeredInventory::merge([
            ("base".to_owned(), sample()),
            ("app".to_owned(), Ledger::new(FileSet::new())),
        ]);
        inventory.record_failure("broken", "root directory unreadable");
        let value: serde_json::Value =
            serde_json::from_str(&inventory_to_json(&inventory).unwrap()).unwrap();

        let layers = value["layers"].as_array().unwrap();
        assert_eq!(layers[0]["id"], "base");
        assert_eq!(layers[1]["id"], "app");
        assert!(layers[1]["package_files"].as_object().unwrap().is_empty());
        // 두 식별자는 키가 같아도 전역 집합에서는 별개
        assert_eq!(value["packages"].as_array().unwrap().len(), 2);
        assert_eq!(value["failures"][0]["layer"], "broken");
        assert!(value.get("os").is_none());
    }
}
