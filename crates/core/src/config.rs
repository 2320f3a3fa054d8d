//! 설정 관리 — 감시 대상 파일별 설정 레코드
//!
//! JSON 설정 파일의 각 엔트리는 [`MonitoredFileConfig`]로 역직렬화됩니다.
//! 키는 파일 경로이거나 다음 리터럴 중 하나입니다:
//! - `--default--`: 모든 파일 엔트리 아래에 깔리는 기본값
//! - `--OS-metrics--`: OS 메트릭 수집 제어 ([`OsMetricsConfig`] 참조)
//!
//! 커맨드라인만으로 실행한 경우 CLI 플래그에서 단일 엔트리가 구성됩니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// `--default--` 설정 키
pub const DEFAULT_CONFIG_KEY: &str = "--default--";

/// `--OS-metrics--` 설정 키
pub const OS_METRICS_CONFIG_KEY: &str = "--OS-metrics--";

/// 읽기 시작 위치 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFrom {
    /// 파일 처음부터
    Beginning,
    /// 파일 끝부터 (프로그램 시작 후 추가된 라인만)
    End,
    /// 처음 N 라인을 건너뛰고 시작
    SkipLines(u64),
}

impl StartFrom {
    /// 설정 파일/CLI의 정수 표현에서 정책을 만듭니다.
    ///
    /// 0은 처음부터, 음수는 끝부터, 양수 N은 N 라인 스킵입니다.
    pub fn from_raw(raw: i64) -> Self {
        if raw == 0 {
            Self::Beginning
        } else if raw < 0 {
            Self::End
        } else {
            Self::SkipLines(raw as u64)
        }
    }
}

/// 감시 대상 파일 하나의 설정
///
/// JSON 필드명은 설정 파일 형식과 일치합니다 (PascalCase).
/// `Debug` 출력에서 DB 비밀번호는 항상 가려집니다.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MonitoredFileConfig {
    /// 이 엔트리의 활성화 여부
    pub enabled: bool,
    /// 감시할 로그 파일 경로
    pub file_path: String,
    /// 활성화할 핸들러 이름 목록 (COUNTER, METRICS, WRITE_TO_FILE)
    pub handlers: Vec<String>,
    /// 읽기 시작 위치 (0=처음, -1=끝, N>0=N라인 스킵)
    pub start_from: i64,
    /// 아직 구현되지 않음
    pub skip_if_line_matches_regex: String,
    /// tail -f 방식으로 파일 변경 추적
    pub follow: bool,
    /// 로그에 도메인이 없을 때 사용할 도메인명
    pub domain_name: String,
    /// 호스트 식별자. 사용자가 직접 설정해야 함
    pub host_id: i64,
    /// 시간 윈도우 크기 (분). 1, 5, 10, 15, 30, 60만 지원. 그 외에는 10
    pub time_window_size_minutes: u32,
    /// WRITE_TO_FILE 핸들러의 대상 파일 경로
    pub write_to_file_target_file: String,
    /// 메트릭을 DB에 저장할지 여부
    pub write_metrics_to_db: bool,
    /// DB 주소 (host:port)
    pub db_address: String,
    /// DB 사용자
    pub db_user: String,
    /// DB 비밀번호
    pub db_password: String,
    /// DB 데이터베이스명
    pub db_database: String,
    /// true면 기존 메트릭 값을 교체, false면 기존 값에 더함
    pub replace_existing_metrics: bool,
    /// 집계기가 유지하는 최근 버킷 수 W. 2~10, 기본 3
    pub metrics_window_size: usize,
    /// 카운터 출력의 top-N 크기. 1~100, 기본 10
    #[serde(rename = "CounterTopNForKeyedMetrics")]
    pub counter_top_n: usize,
    /// 카운터 출력 주기 (초). 기본 30
    #[serde(rename = "CounterOutputIntervalSeconds")]
    pub counter_output_interval_seconds: u64,
    /// 파싱된 로그를 DB에 저장할지 여부
    pub save_logs_to_db: bool,
    /// true면 클라이언트 IP를 저장하지 않음
    #[serde(rename = "SaveLogsToDbMaskIPs")]
    pub save_logs_to_db_mask_ips: bool,
    /// 1이면 봇/스캐너/3xx/4xx 요청을 건너뛰고 저장. 0이면 전부 저장.
    /// enum으로 취급할 것 — 추후 다른 값이 추가될 수 있음
    pub save_logs_to_db_only_relevant: i32,
    /// OS 메트릭 수집 활성화 (`--OS-metrics--` 엔트리에서만 의미 있음)
    #[serde(rename = "OSMetricsEnabled")]
    pub os_metrics_enabled: bool,
    /// OS 메트릭 수집 주기 (분). 1, 5, 10, 15, 30, 60만 지원
    #[serde(rename = "OSMetricsIntervalMinutes")]
    pub os_metrics_interval_minutes: u32,
}

impl Default for MonitoredFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_path: String::new(),
            handlers: Vec::new(),
            start_from: 0,
            skip_if_line_matches_regex: String::new(),
            follow: false,
            domain_name: String::new(),
            host_id: 0,
            time_window_size_minutes: 10,
            write_to_file_target_file: String::new(),
            write_metrics_to_db: false,
            db_address: String::new(),
            db_user: String::new(),
            db_password: String::new(),
            db_database: String::new(),
            replace_existing_metrics: true,
            metrics_window_size: 3,
            counter_top_n: 10,
            counter_output_interval_seconds: 30,
            save_logs_to_db: false,
            save_logs_to_db_mask_ips: false,
            save_logs_to_db_only_relevant: 0,
            os_metrics_enabled: false,
            os_metrics_interval_minutes: 10,
        }
    }
}

impl MonitoredFileConfig {
    /// 범위를 벗어난 값을 기본값으로 되돌립니다.
    ///
    /// 설정 파일 로딩 직후와 CLI 플래그 적용 후에 호출됩니다.
    pub fn normalize(&mut self) {
        if self.counter_output_interval_seconds < 1 {
            self.counter_output_interval_seconds = 30;
        }
        if self.counter_top_n < 1 || self.counter_top_n > 100 {
            self.counter_top_n = 10;
        }
        if self.metrics_window_size < 2 || self.metrics_window_size > 10 {
            self.metrics_window_size = 3;
        }
        if !matches!(self.os_metrics_interval_minutes, 1 | 5 | 10 | 15 | 30 | 60) {
            self.os_metrics_interval_minutes = 10;
        }
    }

    /// 시작 위치 정책을 반환합니다.
    pub fn start_policy(&self) -> StartFrom {
        StartFrom::from_raw(self.start_from)
    }

    /// DB 접속이 필요한 설정인지 확인합니다.
    pub fn needs_db(&self) -> bool {
        self.write_metrics_to_db || self.save_logs_to_db
    }

    /// DB가 필요한 경우 접속 정보가 채워져 있는지 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.needs_db() {
            if self.db_address.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "DbAddress".to_owned(),
                    reason: "required when WriteMetricsToDb or SaveLogsToDb is set".to_owned(),
                });
            }
            if self.db_database.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "DbDatabase".to_owned(),
                    reason: "required when WriteMetricsToDb or SaveLogsToDb is set".to_owned(),
                });
            }
        }
        Ok(())
    }
}

// DB 비밀번호가 로그에 남지 않도록 Debug를 직접 구현
impl fmt::Debug for MonitoredFileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoredFileConfig")
            .field("enabled", &self.enabled)
            .field("file_path", &self.file_path)
            .field("handlers", &self.handlers)
            .field("start_from", &self.start_from)
            .field("follow", &self.follow)
            .field("domain_name", &self.domain_name)
            .field("host_id", &self.host_id)
            .field("time_window_size_minutes", &self.time_window_size_minutes)
            .field("write_to_file_target_file", &self.write_to_file_target_file)
            .field("write_metrics_to_db", &self.write_metrics_to_db)
            .field("db_address", &self.db_address)
            .field("db_user", &self.db_user)
            .field("db_password", &"--REDACTED--")
            .field("db_database", &self.db_database)
            .field("replace_existing_metrics", &self.replace_existing_metrics)
            .field("metrics_window_size", &self.metrics_window_size)
            .field("counter_top_n", &self.counter_top_n)
            .field(
                "counter_output_interval_seconds",
                &self.counter_output_interval_seconds,
            )
            .field("save_logs_to_db", &self.save_logs_to_db)
            .field("save_logs_to_db_mask_ips", &self.save_logs_to_db_mask_ips)
            .field(
                "save_logs_to_db_only_relevant",
                &self.save_logs_to_db_only_relevant,
            )
            .finish_non_exhaustive()
    }
}

/// OS 메트릭 수집 설정
///
/// `--OS-metrics--` 엔트리에서 파생됩니다.
#[derive(Debug, Clone)]
pub struct OsMetricsConfig {
    /// 수집 활성화 여부
    pub enabled: bool,
    /// 수집 주기 (분)
    pub interval_minutes: u32,
    /// 호스트 식별자
    pub host_id: i64,
}

impl OsMetricsConfig {
    /// `--OS-metrics--` 엔트리에서 설정을 만듭니다.
    pub fn from_entry(entry: &MonitoredFileConfig) -> Self {
        Self {
            enabled: entry.os_metrics_enabled,
            interval_minutes: entry.os_metrics_interval_minutes,
            host_id: entry.host_id,
        }
    }
}
