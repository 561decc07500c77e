//! CSV 패키지 목록 (`product,version,vendor`)

use std::collections::BTreeSet;

use crate::types::PackageIdentity;

/// CSV 헤더
pub const HEADER: &str = "product,version,vendor";

/// 패키지 집합을 CSV 문자열로 만듭니다.
///
/// 같은 행으로 표현되는 식별자(아키텍처만 다른 경우 등)는 한 번만 씁니다.
pub fn to_csv<'a, I>(packages: I) -> String
where
    I: IntoIterator<Item = &'a PackageIdentity>,
{
    let rows: BTreeSet<String> = packages.into_iter().map(PackageIdentity::csv_entry).collect();
    let mut out = String::with_capacity(HEADER.len() + 1 + rows.len() * 32);
    out.push_str(HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row);
        out.push('\n');
    }
    out
}
