//! 메트릭 크레이트 — 슬라이딩 시간 윈도우 집계와 OS 메트릭 수집
//!
//! # 모듈 구성
//! - [`window`]: 타임스탬프를 `YYYYMMDDhhmm` 정수 윈도우로 스냅
//! - [`aggregator`]: (파일, 메트릭 타입, 키)별 최근 W개 버킷 유지,
//!   가장 오래된 버킷은 퇴출(eviction)되어 저장용으로 방출
//! - [`os_metrics`]: `uptime` / `free -L` 실행 결과 파싱
//!
//! # 집계 아키텍처
//! ```text
//! RequestRecord -> time_window 스냅 -> add() -> (버킷 증가 | 신규 버킷 | 퇴출)
//!                                               퇴출 버킷 -> 저장 채널 -> 싱크
//! ```

pub mod aggregator;
pub mod os_metrics;
pub mod window;

pub use aggregator::{EvictedBucket, MetricsAggregator};
pub use os_metrics::{MemoryInfo, UptimeInfo};
pub use window::time_window;

/// 메트릭 타입 태그 — 저장 형식이므로 릴리스 간 안정적이어야 합니다.
pub mod metric_type {
    /// 요청 수 (키 없음)
    pub const REQUEST_COUNT: i32 = 1;
    /// 전송 바이트 수 (키 없음)
    pub const BYTES_SENT: i32 = 2;
    /// HTTP 상태 코드별 요청 수
    pub const HTTP_STATUS: i32 = 3;
    /// 클라이언트 IP별 요청 수
    pub const CLIENT_IP: i32 = 4;
    /// HTTP 메서드별 요청 수
    pub const METHOD: i32 = 5;
    /// referer별 요청 수
    pub const REFERER: i32 = 6;
    /// 경로 프리픽스별 요청 수 (2xx 응답만)
    pub const PATH: i32 = 7;
    /// UA 계열별 요청 수
    pub const UA_FAMILY: i32 = 11;
    /// OS 계열별 요청 수
    pub const OS_FAMILY: i32 = 12;
    /// 디바이스 유형별 요청 수
    pub const DEVICE_TYPE: i32 = 13;
    /// 사람 여부별 요청 수
    pub const IS_HUMAN: i32 = 14;
    /// 요청 의도별 요청 수
    pub const REQUEST_INTENT: i32 = 15;
}
