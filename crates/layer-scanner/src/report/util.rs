//! 보고서 공용 헬퍼 -- 타임스탬프, SPDX 식별자, 파일 이름

/// 현재 시각을 RFC3339 UTC 문자열로 반환합니다.
///
/// 시스템 시간이 epoch 이전이면 epoch를 반환합니다.
pub fn current_timestamp() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    unix_to_rfc3339(secs)
}

/// Unix 초를 `YYYY-MM-DDTHH:MM:SSZ`로 변환합니다.
pub fn unix_to_rfc3339(secs: u64) -> String {
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// 1970-01-01 이후 일수를 (연, 월, 일)로 바꿉니다 (proleptic 그레고리력).
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    // 3월 1일 기준 400년 주기(146097일)로 계산
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

/// SPDX 식별자에 쓸 수 있는 문자(영숫자, `.`, `-`)만 남기고 나머지는 `-`로 바꿉니다.
pub fn sanitize_spdx_id(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// 이미지 이름을 파일 이름으로 쓸 수 있게 바꿉니다.
///
/// 예: `library/nginx:1.25` -> `libraryslashnginxtwodots1.25`
pub fn file_safe_name(image: &str) -> String {
    image.replace(':', "twodots").replace('/', "slash")
}
