//! 파일 하나의 파이프라인 — 프로듀서/컨슈머/퍼시스터 연결
//!
//! ```text
//! producer(LineReader) ── mpsc(10) ──► consumer ──► 핸들러들
//!                                          │            └─ 퇴출 버킷 ── mpsc(100) ──► persister ──► 싱크
//!                                          └─ raw 로그 저장 (관련성 필터 적용)
//! ```
//!
//! 종료는 채널 닫힘으로 전파됩니다:
//! 1. 프로듀서가 EOF(비 follow) 또는 치명 에러에서 라인 채널을 닫음
//! 2. 컨슈머가 채널을 드레인한 뒤 모든 핸들러의 `end` 호출
//!    (집계기 플러시가 마지막 버킷들을 저장 채널로 보냄)
//! 3. 저장 채널이 닫히고 퍼시스터가 끝까지 드레인

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tailpost_core::config::MonitoredFileConfig;
use tailpost_core::error::TailpostError;
use tailpost_core::types::RequestRecord;
use tailpost_db::{is_relevant_for_raw_log, AnalyticsSink};
use tailpost_metrics::EvictedBucket;
use tailpost_parsers::FormatDetector;

use crate::handler::{
    CounterHandler, LogHandler, MetricsHandler, WriteToFileHandler, COUNTER_HANDLER_NAME,
    METRIC_GENERATOR_HANDLER_NAME, WRITE_TO_FILE_HANDLER_NAME,
};
use crate::reader::LineReader;

/// 라인 채널 용량. 프로듀서가 과도하게 앞서가지 않도록 작게 유지
const LINE_CHANNEL_CAPACITY: usize = 10;

/// 퇴출 버킷 채널 용량
const SAVE_CHANNEL_CAPACITY: usize = 100;

/// 파이프라인 실행 결과 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// 성공적으로 파싱되어 핸들러에 전달된 라인 수
    pub processed_lines: u64,
    /// 파싱에 실패한 라인 수
    pub error_lines: u64,
}

/// 파일 하나의 파이프라인
///
/// 싱크를 제외한 모든 상태를 단독으로 소유합니다.
pub struct FilePipeline {
    config: MonitoredFileConfig,
    sink: Option<Arc<dyn AnalyticsSink>>,
}

impl FilePipeline {
    /// 파이프라인을 구성합니다.
    ///
    /// `sink`는 DB 기록이 필요 없는 설정이면 `None`이어도 됩니다.
    pub fn new(config: MonitoredFileConfig, sink: Option<Arc<dyn AnalyticsSink>>) -> Self {
        Self { config, sink }
    }

    /// 파일 처리를 끝까지 실행합니다.
    ///
    /// follow 모드에서는 프로듀서가 종료될 때까지 (로테이션 복구 실패 등)
    /// 반환하지 않습니다.
    pub async fn run(self) -> Result<PipelineStats, TailpostError> {
        let config = self.config;
        info!(file = %config.file_path, follow = config.follow, "starting pipeline");

        let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);
        let (save_tx, save_rx) = mpsc::channel::<EvictedBucket>(SAVE_CHANNEL_CAPACITY);

        // 1. 핸들러 조립. 설정 문제는 시작 전에 드러나야 함
        let mut handlers = Vec::new();
        for name in &config.handlers {
            match name.as_str() {
                COUNTER_HANDLER_NAME => {
                    handlers.push(LogHandler::Counter(CounterHandler::begin(
                        config.follow,
                        config.counter_output_interval_seconds,
                        config.counter_top_n,
                    )));
                    info!("created COUNTER handler");
                }
                METRIC_GENERATOR_HANDLER_NAME => {
                    handlers.push(LogHandler::Metrics(MetricsHandler::begin(
                        &config.file_path,
                        config.metrics_window_size,
                        config.time_window_size_minutes,
                        save_tx.clone(),
                    )));
                    info!("created METRICS handler");
                }
                WRITE_TO_FILE_HANDLER_NAME => {
                    handlers.push(LogHandler::WriteToFile(
                        WriteToFileHandler::begin(&config.write_to_file_target_file).await?,
                    ));
                    info!("created WRITE_TO_FILE handler");
                }
                other => {
                    warn!(handler = other, "unknown handler name, skipping");
                }
            }
        }

        // 2. 프로듀서
        let reader = LineReader::new(&config.file_path, config.start_policy(), config.follow);
        let producer = tokio::spawn(reader.run(line_tx));

        // 3. 퍼시스터
        let persister = tokio::spawn(persist_evicted_buckets(
            save_rx,
            if config.write_metrics_to_db {
                self.sink.clone()
            } else {
                None
            },
            config.domain_name.clone(),
            config.time_window_size_minutes,
            config.replace_existing_metrics,
        ));

        // 4. 컨슈머 (현재 태스크)
        let mut detector = FormatDetector::new();
        let mut stats = PipelineStats::default();

        while let Some(line) = line_rx.recv().await {
            match detector.parse_line(&line) {
                Ok(record) => {
                    stats.processed_lines += 1;
                    for handler in handlers.iter_mut() {
                        handler.handle(&record).await;
                    }
                    if config.save_logs_to_db {
                        if let Some(sink) = self.sink.as_deref() {
                            save_raw_log(sink, &config, &record).await;
                        }
                    }
                }
                Err(e) => {
                    stats.error_lines += 1;
                    debug!(error = %e, line, "line dropped");
                }
            }
        }

        // 5. 정리: 핸들러 종료 → 저장 채널 닫힘 → 퍼시스터 드레인
        for handler in handlers.iter_mut() {
            handler.end().await;
        }
        drop(handlers);
        drop(save_tx);
        if let Err(e) = persister.await {
            error!(error = %e, "persister task failed");
        }
        if let Err(e) = producer.await {
            error!(error = %e, "producer task failed");
        }

        info!(
            file = %config.file_path,
            processed = stats.processed_lines,
            errors = stats.error_lines,
            "finished processing file"
        );
        Ok(stats)
    }
}

/// 퇴출 버킷을 싱크에 기록하는 퍼시스터 태스크
///
/// 싱크가 없으면 (메트릭 DB 기록 비활성) 채널만 드레인합니다.
/// 싱크 에러는 로깅 후 해당 버킷을 드롭합니다.
async fn persist_evicted_buckets(
    mut save_rx: mpsc::Receiver<EvictedBucket>,
    sink: Option<Arc<dyn AnalyticsSink>>,
    domain_name: String,
    window_minutes: u32,
    replace_existing: bool,
) {
    while let Some(bucket) = save_rx.recv().await {
        let Some(sink) = sink.as_deref() else {
            continue;
        };
        let domain_id = match sink
            .get_or_create_domain_id(&domain_name, window_minutes)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(domain = domain_name, error = %e, "domain id lookup failed, dropping bucket");
                continue;
            }
        };
        if let Err(e) = sink.save_metric(&bucket, domain_id, replace_existing).await {
            error!(error = %e, "save_metric failed, dropping bucket");
        }
    }
    debug!("persister drained");
}

/// 파싱된 레코드를 raw 로그로 저장합니다.
///
/// vhost 형식이면 레코드의 도메인을, 아니면 설정의 도메인을 사용합니다.
async fn save_raw_log(sink: &dyn AnalyticsSink, config: &MonitoredFileConfig, record: &RequestRecord) {
    if config.save_logs_to_db_only_relevant == 1 && !is_relevant_for_raw_log(record) {
        return;
    }

    let domain_name = record.domain.as_deref().unwrap_or(&config.domain_name);
    let domain_id = match sink
        .get_or_create_domain_id(domain_name, config.time_window_size_minutes)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            error!(domain = domain_name, error = %e, "domain id lookup failed, dropping raw log");
            return;
        }
    };

    if let Err(e) = sink
        .save_raw_log(record, domain_id, config.host_id, config.save_logs_to_db_mask_ips)
        .await
    {
        error!(error = %e, "save_raw_log failed, dropping record");
    }
}
