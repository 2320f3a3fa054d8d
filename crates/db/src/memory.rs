//! 인메모리 싱크 — 테스트 및 드라이런용
//!
//! 저장 호출을 실제로 영속화하지 않고 내부 버퍼에 쌓아둡니다.
//! 파이프라인 통합 테스트가 저장 호출 내용을 검증할 때 사용합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tailpost_core::error::StorageError;
use tailpost_core::types::RequestRecord;
use tailpost_metrics::{EvictedBucket, MemoryInfo, UptimeInfo};

use crate::AnalyticsSink;

/// 저장된 raw 로그 한 건의 스냅샷
#[derive(Debug, Clone)]
pub struct SavedRawLog {
    pub record: RequestRecord,
    pub domain_id: i64,
    pub host_id: i64,
    pub mask_ips: bool,
}

/// 저장된 메트릭 한 건의 스냅샷
#[derive(Debug, Clone)]
pub struct SavedMetric {
    pub bucket: EvictedBucket,
    pub domain_id: i64,
    pub replace_if_exists: bool,
}

/// 인메모리 싱크
#[derive(Default)]
pub struct MemorySink {
    domains: Mutex<HashMap<String, i64>>,
    metrics: Mutex<Vec<SavedMetric>>,
    raw_logs: Mutex<Vec<SavedRawLog>>,
    os_metrics: Mutex<Vec<(UptimeInfo, Option<MemoryInfo>, i64)>>,
}

impl MemorySink {
    /// 빈 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 저장된 메트릭 목록을 복사해 반환합니다.
    pub async fn saved_metrics(&self) -> Vec<SavedMetric> {
        self.metrics.lock().await.clone()
    }

    /// 지금까지 저장된 raw 로그 목록을 복사해 반환합니다.
    pub async fn saved_raw_logs(&self) -> Vec<SavedRawLog> {
        self.raw_logs.lock().await.clone()
    }

    /// 저장된 OS 메트릭 스냅샷 수
    pub async fn saved_os_metrics_count(&self) -> usize {
        self.os_metrics.lock().await.len()
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn get_or_create_domain_id(
        &self,
        domain_name: &str,
        _window_size_minutes: u32,
    ) -> Result<i64, StorageError> {
        let mut domains = self.domains.lock().await;
        let next_id = domains.len() as i64 + 1;
        Ok(*domains.entry(domain_name.to_owned()).or_insert(next_id))
    }

    async fn get_or_create_file_id(
        &self,
        domain_id: i64,
        _host_name: &str,
        _file_path: &str,
    ) -> Result<i64, StorageError> {
        Ok(domain_id * 1000 + 1)
    }

    async fn save_metric(
        &self,
        bucket: &EvictedBucket,
        domain_id: i64,
        replace_if_exists: bool,
    ) -> Result<(), StorageError> {
        self.metrics.lock().await.push(SavedMetric {
            bucket: bucket.clone(),
            domain_id,
            replace_if_exists,
        });
        Ok(())
    }

    async fn save_raw_log(
        &self,
        record: &RequestRecord,
        domain_id: i64,
        host_id: i64,
        mask_ips: bool,
    ) -> Result<(), StorageError> {
        self.raw_logs.lock().await.push(SavedRawLog {
            record: record.clone(),
            domain_id,
            host_id,
            mask_ips,
        });
        Ok(())
    }

    async fn save_os_metrics(
        &self,
        uptime: &UptimeInfo,
        memory: Option<&MemoryInfo>,
        host_id: i64,
    ) -> Result<(), StorageError> {
        self.os_metrics
            .lock()
            .await
            .push((uptime.clone(), memory.cloned(), host_id));
        Ok(())
    }
}
