//! 도메인 타입 -- 패키지 식별자, 생태계, 파일 집합, OS 정보
//!
//! [`PackageIdentity`]는 스캔 전체에서 맵 키로 쓰이는 값 타입입니다.
//! 여섯 필드(name, version, author, ecosystem, arch, epoch)가 모두 같아야
//! 같은 패키지로 취급됩니다. arch나 epoch가 한쪽에만 있는 두 식별자는
//! 서로 다른 패키지입니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// 저장소 상대 경로 집합 (슬래시 구분, 선행 슬래시 없음, 디렉토리 제외)
pub type FileSet = BTreeSet<String>;

/// 패키지별 귀속 파일 맵
pub type PackageFiles = BTreeMap<PackageIdentity, FileSet>;

/// 레이어 식별자
pub type LayerId = String;

/// 패키지 생태계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// dpkg (Debian, Ubuntu)
    Debian,
    /// Python (dist-info, egg-info)
    PyPI,
    /// JavaScript (package.json)
    Npm,
    /// Java (pom.properties, jar)
    Maven,
    /// Go (바이너리 buildinfo, go.mod)
    Golang,
    /// Alpine apk
    Apk,
    /// PHP (composer.lock)
    Composer,
    /// RPM (Fedora, RHEL, Amazon Linux)
    Rpm,
    /// Ruby (gemspec)
    Gem,
    /// Perl 모듈
    Perl,
    /// GitHub 릴리스
    Github,
    /// Bitnami 컴포넌트
    Bitnami,
    /// Rust crate
    Rust,
    /// Gradle
    Gradle,
    /// 생태계 불명 (pkg-config, 바이너리 문자열 등)
    Unknown,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debian => "debian",
            Self::PyPI => "pypi",
            Self::Npm => "npm",
            Self::Maven => "maven",
            Self::Golang => "golang",
            Self::Apk => "apk",
            Self::Composer => "composer",
            Self::Rpm => "rpm",
            Self::Gem => "gem",
            Self::Perl => "perl",
            Self::Github => "github",
            Self::Bitnami => "bitnami",
            Self::Rust => "rust",
            Self::Gradle => "gradle",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl Ecosystem {
    /// Package URL 타입 문자열을 반환합니다.
    ///
    /// 예: Debian -> "deb", Rust -> "cargo", Unknown -> "generic"
    pub fn purl_type(&self) -> &'static str {
        match self {
            Self::Debian => "deb",
            Self::PyPI => "pypi",
            Self::Npm => "npm",
            Self::Maven => "maven",
            Self::Golang => "golang",
            Self::Apk => "apk",
            Self::Composer => "composer",
            Self::Rpm => "rpm",
            Self::Gem => "gem",
            Self::Perl => "perl",
            Self::Github => "github",
            Self::Bitnami => "bitnami",
            Self::Rust => "cargo",
            Self::Gradle => "gradle",
            Self::Unknown => "generic",
        }
    }

    /// 문자열에서 생태계를 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debian" | "deb" | "dpkg" => Some(Self::Debian),
            "pypi" | "python" | "pip" => Some(Self::PyPI),
            "npm" | "node" => Some(Self::Npm),
            "maven" | "java" | "jar" => Some(Self::Maven),
            "golang" | "go" => Some(Self::Golang),
            "apk" | "alpine" => Some(Self::Apk),
            "composer" | "php" => Some(Self::Composer),
            "rpm" => Some(Self::Rpm),
            "gem" | "ruby" => Some(Self::Gem),
            "perl" | "cpan" => Some(Self::Perl),
            "github" => Some(Self::Github),
            "bitnami" => Some(Self::Bitnami),
            "rust" | "cargo" => Some(Self::Rust),
            "gradle" => Some(Self::Gradle),
            "unknown" | "generic" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// 패키지 식별자
///
/// 표시용 원래 대소문자를 유지합니다. 교차 참조 문자열(purl 등)은
/// [`reference_name`](Self::reference_name)으로 소문자화된 이름을 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// 패키지 이름
    pub name: String,
    /// 버전 (epoch 제외)
    pub version: Option<String>,
    /// 작성자/벤더/네임스페이스
    pub author: Option<String>,
    /// 생태계
    pub ecosystem: Ecosystem,
    /// 아키텍처
    pub arch: Option<String>,
    /// epoch
    pub epoch: Option<String>,
}

impl PackageIdentity {
    /// 이름, 버전, 생태계만으로 식별자를 만듭니다.
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
    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    /// 아키텍처를 지정합니다.
    pub fn with_arch(mut self, arch: Option<String>) -> Self {
        self.arch = arch;
        self
    }

    /// epoch를 지정합니다.
    pub fn with_epoch(mut self, epoch: Option<String>) -> Self {
        self.epoch = epoch;
        self
    }

    /// 교차 참조용 소문자 이름
    pub fn reference_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Package URL을 생성합니다.
    ///
    /// Debian 패키지는 OS 정보로 `ubuntu`/`debian` 네임스페이스와
    /// `distro` 한정자를 결정합니다.
    pub fn purl(&self, os: Option<&OsInfo>) -> String {
        let mut name = self.reference_name();
        let mut namespace: Option<String> = None;
        let mut qualifiers: Vec<(&str, String)> = Vec::new();
        let mut subpath: Option<String> = None;

        match self.ecosystem {
            Ecosystem::Debian => {
                let distro = match os.and_then(|o| o.name.as_deref()) {
                    Some(n) if n.trim_end().eq_ignore_ascii_case("ubuntu") => "ubuntu",
                    _ => "debian",
                };
                namespace = Some(distro.to_owned());
                if let Some(arch) = &self.arch {
                    qualifiers.push(("arch", arch.clone()));
                }
                if let Some(v) = os.and_then(OsInfo::release) {
                    qualifiers.push(("distro", format!("{distro}-{v}")));
                }
                if let Some(epoch) = &self.epoch {
                    qualifiers.push(("epoch", epoch.clone()));
                }
            }
            Ecosystem::Rpm | Ecosystem::Maven | Ecosystem::Composer | Ecosystem::Github => {
                namespace = self.author.clone();
                if self.ecosystem == Ecosystem::Rpm {
                    if let Some(arch) = &self.arch {
                        qualifiers.push(("arch", arch.clone()));
                    }
                    if let Some(epoch) = &self.epoch {
                        qualifiers.push(("epoch", epoch.clone()));
                    }
                }
            }
            Ecosystem::Apk => {
                namespace = Some("alpine".to_owned());
                if let Some(arch) = &self.arch {
                    qualifiers.push(("arch", arch.clone()));
                }
            }
            Ecosystem::Golang => {
                let segments: Vec<&str> = name.split('/').collect();
                if segments.len() > 3 {
                    subpath = Some(segments[3..].join("/"));
                    name = segments[..3].join("/");
                }
                namespace = self.author.clone();
            }
            Ecosystem::Bitnami => {
                if let Some(arch) = &self.arch {
                    qualifiers.push(("arch", arch.clone()));
                }
            }
            _ => {}
        }

        let mut purl = format!("pkg:{}/", self.ecosystem.purl_type());
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            purl.push_str(&encode_path(&ns));
            purl.push('/');
        }
        purl.push_str(&encode_path(&name));
        if let Some(version) = &self.version {
            purl.push('@');
            purl.push_str(&encode_component(version));
        }
        if !qualifiers.is_empty() {
            qualifiers.sort_by(|a, b| a.0.cmp(b.0));
            let joined: Vec<String> = qualifiers
                .iter()
                .map(|(k, v)| format!("{k}={}", encode_component(v)))
                .collect();
            purl.push('?');
            purl.push_str(&joined.join("&"));
        }
        if let Some(sub) = subpath {
            purl.push('#');
            purl.push_str(&encode_path(&sub));
        }
        purl
    }

    /// CPE 2.3 문자열을 생성합니다. Amazon 벤더는 `*`로 대체됩니다.
    pub fn cpe(&self) -> String {
        let vendor = match &self.author {
            Some(a) if !a.contains("Amazon") => a.as_str(),
            _ => "*",
        };
        format!(
            "cpe:2.3:a:{vendor}:{}:{}:*:*:*:*:*:*:*",
            self.name,
            self.version.as_deref().unwrap_or("*")
        )
    }

    /// `product,version,vendor` CSV 행
    pub fn csv_entry(&self) -> String {
        let vendor = match &self.author {
            Some(a) if !a.contains("Amazon") => a.as_str(),
            _ => "unknown",
        };
        format!(
            "{},{},{vendor}",
            self.name,
            self.version.as_deref().unwrap_or_default()
        )
    }

    /// 보고서 키 `name_version_author` (빈 값은 `None`)
    pub fn report_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.name,
            self.version.as_deref().unwrap_or("None"),
            self.author.as_deref().unwrap_or("None")
        )
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(v) = &self.version {
            write!(f, "@{v}")?;
        }
        write!(f, " ({})", self.ecosystem)
    }
}

/// 운영체제 식별 정보
///
/// 잘 알려진 릴리스 파일에서 한 번 파싱됩니다. 파일 귀속에는 관여하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    /// 배포판 이름 (예: "Ubuntu")
    pub name: Option<String>,
    /// 사람이 읽는 버전 (예: "22.04.3 LTS (Jammy Jellyfish)")
    pub version: Option<String>,
    /// 기계용 버전 (예: "22.04")
    pub version_id: Option<String>,
    /// 코드명 (예: "jammy")
    pub codename: Option<String>,
    /// CPE 문자열
    pub cpe: Option<String>,
    /// 표시용 이름
    pub pretty_name: Option<String>,
}

impl OsInfo {
    /// 모든 필드가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.version.is_none()
            && self.version_id.is_none()
            && self.codename.is_none()
            && self.cpe.is_none()
            && self.pretty_name.is_none()
    }

    /// 릴리스 번호 (`version_id` 우선, 없으면 `version`)
    pub fn release(&self) -> Option<&str> {
        self.version_id.as_deref().or(self.version.as_deref())
    }
}

impl fmt::Display for OsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.pretty_name, &self.name) {
            (Some(pretty), _) => write!(f, "{pretty}"),
            (None, Some(name)) => write!(f, "{name} {}", self.release().unwrap_or("unknown")),
            (None, None) => write!(f, "unknown"),
        }
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b'~')
}

/// purl 구성 요소 percent-encoding
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// 슬래시를 보존하는 percent-encoding
fn encode_path(s: &str) -> String {
    s.split('/')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join("/")
}
