//! OS 메트릭 수집 — `uptime` / `free -L` 래퍼
//!
//! 시스템 명령을 실행하고 출력을 정규식으로 파싱합니다.
//! macOS와 Ubuntu의 uptime 출력 차이(`load averages:` 대 `load average:`,
//! 일 단위 유무)를 모두 처리합니다.

use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

/// uptime 명령 출력에서 파싱한 정보
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UptimeInfo {
    /// 현재 시각 (표시용 문자열)
    pub current_time: String,
    /// 부팅 후 경과 시간 (분)
    pub up_duration_minutes: i64,
    /// 로그인 사용자 수
    pub users: i64,
    /// 1분 load average
    pub load_average1: String,
    /// 5분 load average
    pub load_average5: String,
    /// 15분 load average
    pub load_average15: String,
}

/// `free -L` 출력에서 파싱한 메모리 정보 (KiB)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    pub swap_use: i64,
    pub cache_use: i64,
    pub mem_use: i64,
    pub mem_free: i64,
    /// `free -L`에는 없을 수 있음. 없으면 0
    pub mem_available: i64,
}

static CURRENT_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{2}:\d{2}(:\d{2})?)").unwrap());

// `.*?` 비탐욕 매칭으로 "up ..." 구간과 사용자 수를 분리
static UP_AND_USERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"up\s+(.*),\s*(\d+)\s+users?").unwrap());

static DAYS_HOURS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+).*?,\s*(\d{1,2}):(\d{2})").unwrap());

static HOURS_MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})").unwrap());

static LOAD_AVERAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"load averages?\s*:\s*(\d+\.\d+)[,\s]\s*(\d+\.\d+)[,\s]\s*(\d+\.\d+)").unwrap()
});

static FREE_L_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"SwapUse\s*(\d+)\s*CachUse\s*(\d+)\s*MemUse\s*(\d+)\s*MemFree\s*(\d+)\s*").unwrap()
});

static MEM_AVAILABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MemAvailable\s*(\d+)").unwrap());

/// `uptime`을 실행하고 출력을 파싱합니다.
pub async fn collect_uptime() -> std::io::Result<Option<UptimeInfo>> {
    let output = Command::new("uptime").output().await?;
    let text = String::from_utf8_lossy(&output.stdout);
    let trimmed = text.trim();
    debug!(uptime = trimmed, "raw uptime output");
    Ok(parse_uptime_output(trimmed))
}

/// `free -L`을 실행하고 출력을 파싱합니다.
pub async fn collect_memory() -> std::io::Result<Option<MemoryInfo>> {
    let output = Command::new("free").arg("-L").output().await?;
    let text = String::from_utf8_lossy(&output.stdout);
    let trimmed = text.trim();
    debug!(free = trimmed, "raw free -L output");
    Ok(parse_free_output(trimmed))
}

/// uptime 출력 문자열을 파싱합니다.
///
/// "up ..., N users" 구간을 찾지 못하면 `None`을 반환합니다.
pub fn parse_uptime_output(uptime_output: &str) -> Option<UptimeInfo> {
    let mut info = UptimeInfo::default();

    info.current_time = match CURRENT_TIME_RE.captures(uptime_output) {
        Some(caps) => caps[1].to_owned(),
        // 예상 밖의 형식이면 시스템 시각으로 대체
        None => Local::now().format("%H:%M:%S").to_string(),
    };

    let up_users = UP_AND_USERS_RE.captures(uptime_output)?;
    let duration_part = &up_users[1];

    if let Some(caps) = DAYS_HOURS_RE.captures(duration_part) {
        let days: i64 = caps[1].parse().unwrap_or(0);
        let hours: i64 = caps[2].parse().unwrap_or(0);
        let minutes: i64 = caps[3].parse().unwrap_or(0);
        info.up_duration_minutes = days * 24 * 60 + hours * 60 + minutes;
    } else if let Some(caps) = HOURS_MINUTES_RE.captures(duration_part) {
        // 일 단위 없이 hours:minutes만 있는 경우
        let hours: i64 = caps[1].parse().unwrap_or(0);
        let minutes: i64 = caps[2].parse().unwrap_or(0);
        info.up_duration_minutes = hours * 60 + minutes;
    }

    info.users = up_users[2].parse().unwrap_or(0);

    if let Some(caps) = LOAD_AVERAGE_RE.captures(uptime_output) {
        info.load_average1 = caps[1].to_owned();
        info.load_average5 = caps[2].to_owned();
        info.load_average15 = caps[3].to_owned();
    }

    Some(info)
}

/// `free -L` 출력 문자열을 파싱합니다.
pub fn parse_free_output(free_output: &str) -> Option<MemoryInfo> {
    let caps = FREE_L_RE.captures(free_output)?;
    let mut info = MemoryInfo {
        swap_use: caps[1].parse().unwrap_or(0),
        cache_use: caps[2].parse().unwrap_or(0),
        mem_use: caps[3].parse().unwrap_or(0),
        mem_free: caps[4].parse().unwrap_or(0),
        mem_available: 0,
    };
    if let Some(avail) = MEM_AVAILABLE_RE.captures(free_output) {
        info.mem_available = avail[1].parse().unwrap_or(0);
    }
    Some(info)
}
