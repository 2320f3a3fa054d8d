//! 핸들러 — 파싱된 요청 레코드의 소비자
//!
//! 핸들러는 닫힌 variant 집합입니다. 공통 표면은 `name`/`handle`/`end`이며
//! 시작 설정은 각 variant의 생성자가 받습니다 (variant별 설정이 서로
//! 달라 공통 `begin(any)` 형태를 두지 않습니다).
//!
//! - [`CounterHandler`]: 인메모리 현재/이전 카운터와 주기적 콘솔 출력
//! - [`MetricsHandler`]: 윈도우 집계기를 구동하고 퇴출 버킷을 저장 채널로 전달
//! - [`WriteToFileHandler`]: 레코드를 JSON 한 줄씩 다른 파일로 재기록

pub mod counter;
pub mod metrics_gen;
pub mod write_file;

pub use counter::CounterHandler;
pub use metrics_gen::MetricsHandler;
pub use write_file::WriteToFileHandler;

use tailpost_core::types::RequestRecord;

/// COUNTER 핸들러 이름
pub const COUNTER_HANDLER_NAME: &str = "COUNTER";
/// METRICS 핸들러 이름
pub const METRIC_GENERATOR_HANDLER_NAME: &str = "METRICS";
/// WRITE_TO_FILE 핸들러 이름
pub const WRITE_TO_FILE_HANDLER_NAME: &str = "WRITE_TO_FILE";

/// 파이프라인에 연결되는 핸들러 variant
pub enum LogHandler {
    Counter(CounterHandler),
    Metrics(MetricsHandler),
    WriteToFile(WriteToFileHandler),
}

impl LogHandler {
    /// 핸들러 이름 (설정 파일의 Handlers 값과 일치)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Counter(_) => COUNTER_HANDLER_NAME,
            Self::Metrics(_) => METRIC_GENERATOR_HANDLER_NAME,
            Self::WriteToFile(_) => WRITE_TO_FILE_HANDLER_NAME,
        }
    }

    /// 레코드 하나를 처리합니다.
    pub async fn handle(&mut self, record: &RequestRecord) {
        match self {
            Self::Counter(h) => h.handle(record).await,
            Self::Metrics(h) => h.handle(record).await,
            Self::WriteToFile(h) => h.handle(record).await,
        }
    }

    /// 스트림 종료를 알립니다. 남은 상태를 플러시합니다.
    ///
    /// 종료 순서는 파이프라인이 결정합니다: 모든 핸들러의 `end`가 끝난 뒤
    /// 저장 채널이 닫힙니다.
    pub async fn end(&mut self) {
        match self {
            Self::Counter(h) => h.end().await,
            Self::Metrics(h) => h.end().await,
            Self::WriteToFile(h) => h.end().await,
        }
    }
}
