//! 메트릭 생성 핸들러 — 레코드를 윈도우 집계기에 공급
//!
//! 레코드 하나당 최대 14개의 메트릭 이벤트를 만듭니다 (요청 수, 바이트,
//! 상태 코드, 메서드, referer, 경로 프리픽스 최대 3개, UA 태그 5종).
//! 집계기에서 퇴출된 버킷은 저장 채널로 전달되어 퍼시스터 태스크가
//! 싱크에 기록합니다.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tailpost_core::types::RequestRecord;
use tailpost_metrics::{metric_type, time_window, EvictedBucket, MetricsAggregator};

/// 메트릭 생성 핸들러
pub struct MetricsHandler {
    file_path: String,
    aggregator: MetricsAggregator,
    window_minutes: u32,
    save_tx: mpsc::Sender<EvictedBucket>,
    handled_count: u64,
}

impl MetricsHandler {
    /// 핸들러를 생성합니다.
    ///
    /// `metrics_window_size`는 집계기가 유지하는 버킷 수 W,
    /// `window_minutes`는 시간 윈도우 폭입니다.
    pub fn begin(
        file_path: impl Into<String>,
        metrics_window_size: usize,
        window_minutes: u32,
        save_tx: mpsc::Sender<EvictedBucket>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            aggregator: MetricsAggregator::new(metrics_window_size),
            window_minutes,
            save_tx,
            handled_count: 0,
        }
    }

    /// 레코드 하나를 집계합니다.
    pub async fn handle(&mut self, record: &RequestRecord) {
        self.handled_count += 1;
        let window = time_window(&record.timestamp, self.window_minutes);

        self.add(metric_type::REQUEST_COUNT, "", window, 1).await;
        self.add(metric_type::BYTES_SENT, "", window, record.bytes_sent as i64)
            .await;
        self.add(metric_type::HTTP_STATUS, &record.status, window, 1)
            .await;
        self.add(metric_type::METHOD, &record.method, window, 1).await;

        if !record.referer.is_empty() {
            self.add(metric_type::REFERER, &record.referer, window, 1)
                .await;
        }

        // 경로 메트릭은 2xx 응답에만 기록. 스캐너가 뿌리는 수백 개의
        // 404 경로로 키 공간이 불어나는 것을 막는다
        if record.status.starts_with('2') {
            for prefix in [&record.path1, &record.path2, &record.path3] {
                if !prefix.is_empty() {
                    self.add(metric_type::PATH, prefix, window, 1).await;
                }
            }
        }

        self.add(metric_type::UA_FAMILY, record.user_agent.family.as_tag(), window, 1)
            .await;
        self.add(metric_type::OS_FAMILY, record.user_agent.os.as_tag(), window, 1)
            .await;
        self.add(
            metric_type::DEVICE_TYPE,
            record.user_agent.device_type.as_tag(),
            window,
            1,
        )
        .await;
        self.add(metric_type::IS_HUMAN, record.user_agent.human.as_tag(), window, 1)
            .await;
        self.add(
            metric_type::REQUEST_INTENT,
            record.user_agent.intent.as_tag(),
            window,
            1,
        )
        .await;
    }

    async fn add(&mut self, metric: i32, key: &str, window: i64, delta: i64) {
        let evicted = self
            .aggregator
            .add(&self.file_path, metric, key, window, delta);
        if let Some(bucket) = evicted {
            debug!(metric_type = bucket.metric_type, time_window = bucket.time_window,
                "bucket evicted, forwarding for persistence");
            if self.save_tx.send(bucket).await.is_err() {
                warn!("save channel closed, dropping evicted bucket");
            }
        }
    }

    /// 스트림 종료: 남은 버킷을 전부 플러시합니다.
    pub async fn end(&mut self) {
        let remaining = self.aggregator.flush(&self.file_path);
        info!(
            file = %self.file_path,
            handled = self.handled_count,
            flushed_buckets = remaining.len(),
            "metrics handler finished"
        );
        for bucket in remaining {
            if self.save_tx.send(bucket).await.is_err() {
                warn!("save channel closed during flush");
                return;
            }
        }
    }

    /// 처리한 레코드 수 (테스트용)
    pub fn handled_count(&self) -> u64 {
        self.handled_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use tailpost_core::types::{DeviceType, Human, Intent, OsFamily, UaFamily};

    const FILE: &str = "/var/log/test-access.log";

    fn record_at(minute: u32, status: &str) -> RequestRecord {
        let mut record = RequestRecord::new();
        record.timestamp = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 1, 12, minute, 0)
            .unwrap();
        record.status = status.to_owned();
        record.method = "GET".to_owned();
        record.path = "/a/b/c/d.html".to_owned();
        record.path1 = "/a".to_owned();
        record.path2 = "/a/b".to_owned();
        record.path3 = "/a/b/c".to_owned();
        record.bytes_sent = 100;
        record.user_agent.family = UaFamily::Chrome;
        record.user_agent.os = OsFamily::MacOS;
        record.user_agent.device_type = DeviceType::Desktop;
        record.user_agent.human = Human::Unknown;
        record.user_agent.intent = Intent::Unknown;
        record
    }

    #[tokio::test]
    async fn flush_emits_all_buckets_on_end() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut handler = MetricsHandler::begin(FILE, 3, 1, tx);
        handler.handle(&record_at(0, "200")).await;
        handler.end().await;
        drop(handler);

        let mut buckets = Vec::new();
        while let Some(bucket) = rx.recv().await {
            buckets.push(bucket);
        }
        // 요청 수, 바이트, 상태, 메서드, 경로 3개, UA 태그 5종 = 12
        assert_eq!(buckets.len(), 12);
        assert!(buckets
            .iter()
            .any(|b| b.metric_type == metric_type::REQUEST_COUNT && b.value == 1));
        assert!(buckets
            .iter()
            .any(|b| b.metric_type == metric_type::BYTES_SENT && b.value == 100));
    }

    #[tokio::test]
    async fn path_metrics_only_for_2xx() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut handler = MetricsHandler::begin(FILE, 3, 1, tx);
        handler.handle(&record_at(0, "404")).await;
        handler.end().await;
        drop(handler);

        let mut buckets = Vec::new();
        while let Some(bucket) = rx.recv().await {
            buckets.push(bucket);
        }
        assert!(!buckets.iter().any(|b| b.metric_type == metric_type::PATH));
    }

    #[tokio::test]
    async fn three_path_prefixes_per_2xx_request() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut handler = MetricsHandler::begin(FILE, 3, 1, tx);
        handler.handle(&record_at(0, "200")).await;
        handler.end().await;
        drop(handler);

        let mut path_keys = Vec::new();
        while let Some(bucket) = rx.recv().await {
            if bucket.metric_type == metric_type::PATH {
                path_keys.push(bucket.key_value);
            }
        }
        path_keys.sort();
        assert_eq!(path_keys, vec!["/a", "/a/b", "/a/b/c"]);
    }

    #[tokio::test]
    async fn eviction_flows_to_save_channel_before_end() {
        // W=2, 1분 윈도우: 3번째 분이 들어오면 첫 버킷이 퇴출됨
        let (tx, mut rx) = mpsc::channel(100);
        let mut handler = MetricsHandler::begin(FILE, 2, 1, tx);
        handler.handle(&record_at(0, "200")).await;
        handler.handle(&record_at(1, "200")).await;
        handler.handle(&record_at(2, "200")).await;

        let evicted = rx.try_recv().expect("eviction should have been forwarded");
        assert_eq!(evicted.time_window, 202501011200);
    }

    #[tokio::test]
    async fn empty_referer_is_not_counted() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut handler = MetricsHandler::begin(FILE, 3, 1, tx);
        handler.handle(&record_at(0, "200")).await;
        handler.end().await;
        drop(handler);

        while let Some(bucket) = rx.recv().await {
            assert_ne!(bucket.metric_type, metric_type::REFERER);
        }
    }
}
