//! Debian dpkg 데이터베이스 추출기
//!
//! # 소스
//!
//! - `var/lib/dpkg/status`: 설치된 패키지 단락 목록
//! - `var/lib/dpkg/status.d/<pkg>`: distroless 이미지의 패키지별 단락
//!
//! # 소유 파일
//!
//! - `info/<pkg>[:<arch>].list`에 나열된 파일
//! - 같은 접두의 유지보수 스크립트/메타 파일 (`.md5sums`, `.postinst` 등)
//! - 일부 핵심 패키지가 제공하는 `bin/` 실행 파일
//! - status 파일과 `info/` 밖의 공용 dpkg 파일
//!
//! `Source:` 필드와 `python-`/`python3-` 접두 패키지는 별칭 식별자로 추가 기록합니다.

use std::path::Path;

use tracing::debug;

use crate::error::LayerScanError;
use crate::extractor::{Extractor, file_name, files_under, read_text_capped};
use crate::ledger::Extraction;
use crate::normalize::RawPackage;
use crate::types::{Ecosystem, FileSet, PackageIdentity};

const DPKG_DIR: &str = "var/lib/dpkg";
const INFO_DIR: &str = "var/lib/dpkg/info";
const STATUS_D_DIR: &str = "var/lib/dpkg/status.d";

/// `info/` 아래 패키지별 메타 파일 접미사
const INFO_SUFFIXES: &[&str] = &[
    ".preinst",
    ".prerm",
    ".postrm",
    ".postinst",
    ".list",
    ".md5sums",
    ".shlibs",
    ".symbols",
    ".triggers",
    ".conffiles",
    ".templates",
    ".config",
];

/// `.list`에 나오지 않지만 패키지가 설치하는 `bin/` 실행 파일
const INSTALLED_BINS: &[(&str, &[&str])] = &[
    (
        "coreutils",
        &[
            "arch", "base64", "basename", "cat", "chcon", "chgrp", "chmod", "chown", "chroot",
            "cksum", "comm", "cp", "csplit", "cut", "date", "dd", "df", "dir", "dircolors",
            "dirname", "du", "echo", "env", "expand", "expr", "factor", "false", "flock", "fmt",
            "fold", "groups", "head", "hostid", "id", "install", "join", "link", "ln", "logname",
            "ls", "md5sum", "mkdir", "mkfifo", "mknod", "mktemp", "mv", "nice", "nl", "nohup",
            "nproc", "numfmt", "od", "paste", "pathchk", "pinky", "pr", "printenv", "printf",
            "ptx", "pwd", "readlink", "realpath", "rm", "rmdir", "runcon", "sha1sum", "shasum",
            "sha256sum", "sha384sum", "sha224sum", "sha512sum", "seq", "shred", "sleep", "sort",
            "split", "stat", "stty", "sum", "sync", "tac", "tail", "tee", "test", "timeout",
            "touch", "tr", "true", "truncate", "tsort", "tty", "uname", "unexpand", "uniq",
            "unlink", "users", "vdir", "wc", "who", "whoami", "yes",
        ],
    ),
    ("findutils", &["find", "xargs"]),
    (
        "procps",
        &[
            "kill", "pkill", "pgrep", "pmap", "ps", "pwdx", "skill", "slabtop", "snice", "sysctl",
            "tload", "top", "uptime", "vmstat", "w", "watch",
        ],
    ),
    (
        "bsdutils",
        &["logger", "renice", "script", "scriptlive", "scriptreplay", "wall"],
    ),
    (
        "debianutils",
        &[
            "add-shell", "installkernel", "ischroot", "remove-shell", "run-parts", "savelog",
            "update-shells", "which",
        ],
    ),
    (
        "libc-bin",
        &[
            "getconf", "getent", "iconv", "ldd", "ldconfig", "locale", "localedef", "tzselect",
            "zdump", "zic",
        ],
    ),
];

/// dpkg status 단락 하나
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// `Package`
    pub package: String,
    /// `Version` (epoch 포함 가능)
    pub version: Option<String>,
    /// `Architecture`
    pub arch: Option<String>,
    /// `Source` (이름과 선택적 괄호 버전)
    pub source: Option<String>,
    /// `Status`
    pub status: Option<String>,
}

impl StatusEntry {
    /// `Status`가 없거나 마지막 단어가 `installed`이면 설치된 것으로 봅니다.
    pub fn is_installed(&self) -> bool {
        self.status
            .as_deref()
            .is_none_or(|s| s.split_whitespace().last() == Some("installed"))
    }

    fn identity(&self) -> PackageIdentity {
        RawPackage::new(&self.package, self.version.clone(), Ecosystem::Debian)
            .arch(self.arch.clone())
            .normalize()
    }

    /// `Source:`와 python 접두 별칭
    fn aliases(&self) -> Vec<PackageIdentity> {
        let mut aliases = Vec::new();

        let pypi_name = self
            .package
            .strip_prefix("python3-")
            .or_else(|| self.package.strip_prefix("python-"));
        if let Some(name) = pypi_name.filter(|n| !n.is_empty()) {
            aliases.push(
                RawPackage::new(name, self.version.clone(), Ecosystem::PyPI)
                    .arch(self.arch.clone())
                    .normalize(),
            );
        }

        if let Some(source) = &self.source {
            let mut parts = source.split_whitespace();
            if let Some(name) = parts.next().filter(|n| *n != self.package) {
                let version = parts
                    .next()
                    .map(|v| v.trim_matches(|c| c == '(' || c == ')').to_owned())
                    .or_else(|| self.version.clone());
                aliases.push(
                    RawPackage::new(name, version, Ecosystem::Debian)
                        .arch(self.arch.clone())
                        .normalize(),
                );
            }
        }

        aliases
    }
}

/// deb822 단락을 파싱합니다. `Package`가 없는 단락은 버립니다.
pub fn parse_status(text: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut current = StatusEntry::default();

    let mut flush = |entry: &mut StatusEntry| {
        let entry = std::mem::take(entry);
        if !entry.package.is_empty() {
            entries.push(entry);
        }
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut current);
            continue;
        }
        // 연속 행 (Description 본문 등)
        if line.starts_with([' ', '\t']) {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_owned();
        match key {
            "Package" => current.package = value,
            "Version" => current.version = Some(value),
            "Architecture" => current.arch = Some(value),
            "Source" => current.source = Some(value),
            "Status" => current.status = Some(value),
            _ => {}
        }
    }
    flush(&mut current);

    entries
}

/// dpkg 추출기
pub struct DpkgExtractor {
    max_size: u64,
}

impl DpkgExtractor {
    /// 매니페스트 크기 상한으로 추출기를 생성합니다.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    fn read_status(
        &self,
        path: &str,
        root: &Path,
        out: &mut Extraction,
    ) -> Option<Vec<StatusEntry>> {
        match read_text_capped(root, path, self.max_size) {
            Ok(text) => Some(parse_status(&text)),
            Err(e) => {
                out.skip(path, e);
                None
            }
        }
    }

    /// 패키지 하나가 `info/`와 `bin/`에서 소유하는 파일
    fn owned_files(
        &self,
        entry: &StatusEntry,
        candidates: &FileSet,
        root: &Path,
        out: &mut Extraction,
    ) -> Vec<String> {
        let mut prefixes = vec![format!("{INFO_DIR}/{}", entry.package)];
        if let Some(arch) = &entry.arch {
            prefixes.push(format!("{INFO_DIR}/{}:{arch}", entry.package));
        }

        let mut files = Vec::new();
        for prefix in &prefixes {
            let list = format!("{prefix}.list");
            if !candidates.contains(&list) {
                continue;
            }
            match read_text_capped(root, &list, self.max_size) {
                Ok(text) => files.extend(
                    text.lines()
                        .map(|l| l.trim().trim_start_matches('/'))
                        .filter(|l| !l.is_empty())
                        .map(str::to_owned),
                ),
                Err(e) => out.skip(&list, e),
            }
            files.extend(
                INFO_SUFFIXES
                    .iter()
                    .map(|suffix| format!("{prefix}{suffix}"))
                    .filter(|f| candidates.contains(f)),
            );
        }

        if let Some((_, bins)) = INSTALLED_BINS.iter().find(|(pkg, _)| *pkg == entry.package) {
            files.extend(bins.iter().map(|b| format!("bin/{b}")));
        }

        files
    }
}

impl Extractor for DpkgExtractor {
    fn name(&self) -> &'static str {
        "dpkg"
    }

    fn extract(&self, candidates: &FileSet, root: &Path) -> Result<Extraction, LayerScanError> {
        let mut extraction = Extraction::new();

        // info/ 밖의 공용 dpkg 파일 (status, available, diversions 등)
        let shared: Vec<String> = files_under(candidates, DPKG_DIR)
            .filter(|p| !p.starts_with(INFO_DIR) && !p.starts_with(STATUS_D_DIR))
            .cloned()
            .collect();

        for status_path in candidates.iter().filter(|p| p.ends_with("dpkg/status")) {
            let Some(entries) = self.read_status(status_path, root, &mut extraction) else {
                continue;
            };
            debug!(path = %status_path, packages = entries.len(), "dpkg status");

            for entry in entries.iter().filter(|e| e.is_installed()) {
                let mut files = self.owned_files(entry, candidates, root, &mut extraction);
                files.push(status_path.clone());
                files.extend(shared.iter().cloned());
                extraction.add_within(entry.identity(), files, candidates);

                for alias in entry.aliases() {
                    let alias_files =
                        std::iter::once(status_path.clone()).chain(shared.iter().cloned());
                    extraction.add_within(alias, alias_files, candidates);
                }
            }
        }

        // distroless: 확장자 없는 파일이 단락, 같은 이름의 `.md5sums` 등이 메타 파일
        for path in files_under(candidates, STATUS_D_DIR).filter(|p| !file_name(p).contains('.')) {
            let Some(entries) = self.read_status(path, root, &mut extraction) else {
                continue;
            };
            let siblings: Vec<String> = files_under(candidates, STATUS_D_DIR)
                .filter(|p| p.starts_with(&format!("{path}.")))
                .cloned()
                .collect();

            for entry in entries.iter().filter(|e| e.is_installed()) {
                let files = std::iter::once(path.clone()).chain(siblings.iter().cloned());
                extraction.add_within(entry.identity(), files, candidates);
                for alias in entry.aliases() {
                    extraction.add_within(alias, [path.as_str()], candidates);
                }
            }
        }

        Ok(extraction)
    }
}
