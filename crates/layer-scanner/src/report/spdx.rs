//! SPDX 2.3 JSON SBOM 생성
//!
//! [`LayeredInventory`]에서 [SPDX](https://spdx.dev/) 2.3 JSON 문서를 만듭니다.
//!
//! - 전역 패키지 집합의 각 식별자마다 패키지 하나 (purl 외부 참조 포함)
//! - 컨테이너 이미지 패키지 `SPDXRef-ContainerImage`
//! - 릴리스 버전을 아는 경우 OS 패키지 `SPDXRef-OperatingSystem`
//! - 각 레이어 유니버스의 `(레이어, 경로)`마다 파일 하나
//! - 귀속 관계마다 `CONTAINS` 관계 (중복 제거), 문서 루트의 `DESCRIBES` 관계

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::debug;

use super::util;
use crate::error::LayerScanError;
use crate::inventory::LayeredInventory;
use crate::types::{OsInfo, PackageIdentity};

const DOCUMENT_ID: &str = "SPDXRef-DOCUMENT";
const CONTAINER_ID: &str = "SPDXRef-ContainerImage";
const OS_ID: &str = "SPDXRef-OperatingSystem";
const NONE: &str = "NONE";
const NOASSERTION: &str = "NOASSERTION";

/// SPDX 2.3 문서 루트 구조
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxDocument {
    spdx_version: String,
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    name: String,
    data_license: String,
    document_namespace: String,
    creation_info: SpdxCreationInfo,
    packages: Vec<SpdxPackage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    files: Vec<SpdxFile>,
    relationships: Vec<SpdxRelationship>,
}

/// SPDX 생성 정보
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxCreationInfo {
    created: String,
    creators: Vec<String>,
}

/// SPDX 패키지
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxPackage {
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    supplier: Option<String>,
    download_location: String,
    files_analyzed: bool,
    license_concluded: String,
    license_declared: String,
    copyright_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_package_purpose: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    external_refs: Vec<SpdxExternalRef>,
}

/// SPDX 외부 참조
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxExternalRef {
    reference_category: String,
    reference_type: String,
    reference_locator: String,
}

/// SPDX 파일
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxFile {
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    file_name: String,
    license_concluded: String,
    copyright_text: String,
    comment: String,
}

/// SPDX 관계
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxRelationship {
    spdx_element_id: String,
    relationship_type: String,
    related_spdx_element: String,
}

/// 충돌 없는 SPDX 식별자 할당기
///
/// 정리된 이름이 겹치면 `-2`, `-3`... 을 붙입니다.
#[derive(Default)]
struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    fn allocate(&mut self, prefix: &str, raw: &str) -> String {
        let base = format!("{prefix}-{}", util::sanitize_spdx_id(raw));
        let mut candidate = base.clone();
        let mut n = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        candidate
    }
}

/// 인벤토리에서 SPDX 2.3 JSON 문서를 생성합니다.
///
/// `image`는 컨테이너 패키지 이름과 문서 이름에 쓰입니다.
pub fn generate(inventory: &LayeredInventory, image: &str) -> Result<String, LayerScanError> {
    let mut ids = IdAllocator::default();
    let os = inventory.os_info();

    let mut packages = vec![container_package(image)];
    let mut relationships = vec![relationship(DOCUMENT_ID, "DESCRIBES", CONTAINER_ID)];

    if let Some(os_package) = os.and_then(os_package) {
        packages.push(os_package);
        relationships.push(relationship(CONTAINER_ID, "CONTAINS", OS_ID));
    }

    let mut package_ids: BTreeMap<&PackageIdentity, String> = BTreeMap::new();
    for identity in inventory.packages() {
        let raw = match &identity.version {
            Some(v) => format!("{}-{v}", identity.name),
            None => identity.name.clone(),
        };
        let id = ids.allocate("SPDXRef-Package", &raw);
        packages.push(identity_package(identity, &id, os));
        relationships.push(relationship(CONTAINER_ID, "CONTAINS", &id));
        package_ids.insert(identity, id);
    }

    let mut files = Vec::new();
    let mut file_ids: BTreeMap<(&str, &str), String> = BTreeMap::new();
    for (layer, ledger) in inventory.layers() {
        for path in ledger.universe() {
            let id = ids.allocate("SPDXRef-File", &format!("{layer}-{path}"));
            files.push(SpdxFile {
                spdx_id: id.clone(),
                file_name: format!("/{path}"),
                license_concluded: NOASSERTION.to_owned(),
                copyright_text: NOASSERTION.to_owned(),
                comment: format!("Layer: {layer}"),
            });
            file_ids.insert((layer.as_str(), path.as_str()), id);
        }
    }

    // 같은 귀속이 여러 경로로 보고되어도 관계는 하나만 남김
    let mut edges: BTreeSet<(&str, &str)> = BTreeSet::new();
    for attribution in inventory.relations() {
        let (Some(pkg_id), Some(file_id)) = (
            package_ids.get(attribution.package),
            file_ids.get(&(attribution.layer, attribution.path)),
        ) else {
            continue;
        };
        edges.insert((pkg_id.as_str(), file_id.as_str()));
    }
    relationships.extend(
        edges
            .into_iter()
            .map(|(pkg, file)| relationship(pkg, "CONTAINS", file)),
    );

    debug!(
        packages = packages.len(),
        files = files.len(),
        relationships = relationships.len(),
        "spdx document assembled"
    );

    let doc = SpdxDocument {
        spdx_version: "SPDX-2.3".to_owned(),
        spdx_id: DOCUMENT_ID.to_owned(),
        name: image.to_owned(),
        data_license: "CC0-1.0".to_owned(),
        document_namespace: format!("https://strata.dev/spdx/{}", uuid::Uuid::new_v4()),
        creation_info: SpdxCreationInfo {
            created: util::current_timestamp(),
            creators: vec![format!("Tool: strata-{}", env!("CARGO_PKG_VERSION"))],
        },
        packages,
        files,
        relationships,
    };

    serde_json::to_string_pretty(&doc)
        .map_err(|e| LayerScanError::Report(format!("SPDX JSON serialization failed: {e}")))
}

fn container_package(image: &str) -> SpdxPackage {
    SpdxPackage {
        spdx_id: CONTAINER_ID.to_owned(),
        name: image.to_owned(),
        version_info: None,
        supplier: None,
        download_location: NONE.to_owned(),
        files_analyzed: false,
        license_concluded: NONE.to_owned(),
        license_declared: NONE.to_owned(),
        copyright_text: NONE.to_owned(),
        primary_package_purpose: Some("CONTAINER".to_owned()),
        external_refs: Vec::new(),
    }
}

/// 릴리스 버전이 있을 때만 OS 패키지를 만듭니다.
///
/// 이름은 OS 이름의 첫 단어를 소문자로 바꾼 값입니다 (`Debian GNU/Linux` -> `debian`).
fn os_package(os: &OsInfo) -> Option<SpdxPackage> {
    let version = os.release()?;
    let name = os
        .name
        .as_deref()
        .and_then(|n| n.split_whitespace().next())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "linux".to_owned());
    Some(SpdxPackage {
        spdx_id: OS_ID.to_owned(),
        name,
        version_info: Some(version.to_owned()),
        supplier: None,
        download_location: NONE.to_owned(),
        files_analyzed: false,
        license_concluded: NONE.to_owned(),
        license_declared: NONE.to_owned(),
        copyright_text: NONE.to_owned(),
        primary_package_purpose: Some("OPERATING-SYSTEM".to_owned()),
        external_refs: Vec::new(),
    })
}

fn identity_package(identity: &PackageIdentity, id: &str, os: Option<&OsInfo>) -> SpdxPackage {
    SpdxPackage {
        spdx_id: id.to_owned(),
        name: identity.name.clone(),
        version_info: identity.version.clone(),
        supplier: identity
            .author
            .as_ref()
            .map(|a| format!("Organization: {a}")),
        download_location: NONE.to_owned(),
        files_analyzed: false,
        license_concluded: NONE.to_owned(),
        license_declared: NONE.to_owned(),
        copyright_text: NONE.to_owned(),
        primary_package_purpose: Some("LIBRARY".to_owned()),
        external_refs: vec![
            SpdxExternalRef {
                reference_category: "PACKAGE-MANAGER".to_owned(),
                reference_type: "purl".to_owned(),
                reference_locator: identity.purl(os),
            },
            SpdxExternalRef {
                reference_category: "SECURITY".to_owned(),
                reference_type: "cpe23Type".to_owned(),
                reference_locator: identity.cpe(),
            },
        ],
    }
}

fn relationship(from: &str, kind: &str, to: &str) -> SpdxRelationship {
    SpdxRelationship {
        spdx_element_id: from.to_owned(),
        relationship_type: kind.to_owned(),
        related_spdx_element: to.to_owned(),
    }
}
