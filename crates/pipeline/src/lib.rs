//! 파일별 파이프라인 크레이트
//!
//! # 모듈 구성
//! - [`reader`]: tail -f 방식 라인 리더 (로테이션 인지, 시작 위치 정책)
//! - [`handler`]: 파싱된 레코드를 소비하는 핸들러 3종
//!   (카운터 / 메트릭 생성기 / 파일 재기록)
//! - [`pipeline`]: 프로듀서-컨슈머-퍼시스터 연결과 생명주기
//!
//! # 아키텍처
//! ```text
//! LineReader -> mpsc(10) -> FormatDetector/파서 -> 핸들러들
//!                                 |                    └─ 집계기 -> mpsc(100) -> 퇴출 버킷 저장
//!                                 └─ 관련성 필터 -> raw 로그 저장
//! ```
//!
//! 파이프라인 하나는 파일 하나를 소유하며, 싱크를 제외한 어떤 상태도
//! 다른 파이프라인과 공유하지 않습니다. 종료는 채널 닫힘으로 전파됩니다.

pub mod handler;
pub mod pipeline;
pub mod reader;

pub use handler::{
    CounterHandler, LogHandler, MetricsHandler, WriteToFileHandler, COUNTER_HANDLER_NAME,
    METRIC_GENERATOR_HANDLER_NAME, WRITE_TO_FILE_HANDLER_NAME,
};
pub use pipeline::{FilePipeline, PipelineStats};
pub use reader::LineReader;
