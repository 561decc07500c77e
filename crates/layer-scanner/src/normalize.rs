//! 패키지 식별자 정규화
//!
//! 추출기가 읽은 원시 필드를 [`PackageIdentity`]로 바꿉니다.
//! [`normalize`]는 전체 함수입니다. 인식하지 못하는 입력은 그대로 통과합니다.
//!
//! - 빈 문자열 필드는 `None`으로 취급
//! - `epoch:version` 결합 문자열에서 epoch 분리 (epoch가 비어 있고 접두가 숫자일 때)
//! - 벤더 문자열의 표기 차이를 정규 토큰으로 접기 (`redhat`, `amazonlinux`, `suse`)

use crate::types::{Ecosystem, PackageIdentity};

/// 정규화 이전의 원시 패키지 필드
#[derive(Debug, Clone)]
pub struct RawPackage {
    /// 패키지 이름
    pub name: String,
    /// 버전 (epoch가 붙어 있을 수 있음)
    pub version: Option<String>,
    /// 작성자/벤더
    pub author: Option<String>,
    /// 생태계
    pub ecosystem: Ecosystem,
    /// 아키텍처
    pub arch: Option<String>,
    /// epoch
    pub epoch: Option<String>,
}

impl RawPackage {
    /// 이름, 버전, 생태계로 원시 패키지를 만듭니다.
    pub fn new(name: impl Into<String>, version: Option<String>, ecosystem: Ecosystem) -> Self {
        Self {
            name: name.into(),
            version,
            author: None,
            ecosystem,
            arch: None,
            epoch: None,
        }
    }

    /// 작성자를 지정합니다.
    pub fn author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    /// 아키텍처를 지정합니다.
    pub fn arch(mut self, arch: Option<String>) -> Self {
        self.arch = arch;
        self
    }

    /// epoch를 지정합니다.
    pub fn epoch(mut self, epoch: Option<String>) -> Self {
        self.epoch = epoch;
        self
    }

    /// 정규화된 식별자로 변환합니다.
    pub fn normalize(self) -> PackageIdentity {
        normalize(self)
    }
}

/// 원시 필드를 정규화된 [`PackageIdentity`]로 변환합니다.
pub fn normalize(raw: RawPackage) -> PackageIdentity {
    let name = raw.name.trim().to_owned();
    let mut version = non_empty(raw.version);
    let mut epoch = non_empty(raw.epoch);

    if epoch.is_none() {
        if let Some((e, v)) = version.as_deref().and_then(split_epoch) {
            epoch = Some(e.to_owned());
            version = Some(v.to_owned());
        }
    }

    PackageIdentity {
        name,
        version,
        author: non_empty(raw.author).map(|a| canonical_vendor(&a)),
        ecosystem: raw.ecosystem,
        arch: non_empty(raw.arch),
        epoch,
    }
}

/// 벤더 문자열을 알려진 정규 토큰으로 접습니다.
pub fn canonical_vendor(vendor: &str) -> String {
    if vendor.contains("Red") {
        "redhat".to_owned()
    } else if vendor.contains("Amazon") {
        "amazonlinux".to_owned()
    } else if vendor.to_lowercase().contains("suse") {
        "suse".to_owned()
    } else {
        vendor.to_owned()
    }
}

/// `epoch:version`을 분리합니다. epoch는 숫자로만 이루어져야 합니다.
fn split_epoch(version: &str) -> Option<(&str, &str)> {
    let (e, v) = version.split_once(':')?;
    if e.is_empty() || v.is_empty() || !e.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((e, v))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
