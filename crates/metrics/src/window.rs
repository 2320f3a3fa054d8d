//! 시간 윈도우 스냅 — 타임스탬프를 `YYYYMMDDhhmm` 정수로 변환
//!
//! 분(minute)은 윈도우 크기의 배수로 내림됩니다.
//! 지원 크기는 1, 5, 10, 15, 30, 60분이며 그 외 값은 10분으로 처리됩니다.

use chrono::{DateTime, FixedOffset, Timelike};

/// 타임스탬프를 스냅된 시간 윈도우 정수로 변환합니다.
///
/// 분 부분은 `mm - (mm % window_minutes)`로 내림됩니다.
/// 예: `window_minutes=10`일 때 13:55 → `..1350`, `window_minutes=60`일 때 → `..1300`.
pub fn time_window(timestamp: &DateTime<FixedOffset>, window_minutes: u32) -> i64 {
    let minutes = timestamp.minute();
    let snapped = match window_minutes {
        1 => minutes,
        // 0 또는 5로 끝나야 함
        5 => minutes - (minutes % 5),
        // 00, 15, 30, 45 중 하나
        15 => minutes - (minutes % 15),
        // 00 또는 30
        30 => minutes - (minutes % 30),
        // 항상 00
        60 => 0,
        // 기본 10분: 00, 10, 20, 30, 40, 50
        _ => minutes - (minutes % 10),
    };
    let prefix = timestamp.format("%Y%m%d%H").to_string();
    format!("{prefix}{snapped:02}").parse().unwrap_or(0)
}
