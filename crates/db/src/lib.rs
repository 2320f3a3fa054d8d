//! 저장 싱크 — 파이프라인과 영속 계층 사이의 유일한 공유 자원
//!
//! # 모듈 구성
//! - [`AnalyticsSink`]: 싱크 trait. 파이프라인은 이 trait을 통해서만
//!   저장 계층을 봅니다
//! - [`mysql`]: MySQL 구현 ([`mysql::MySqlSink`])
//! - [`memory`]: 테스트용 인메모리 구현 ([`memory::MemorySink`])
//! - [`relevance`]: raw 로그 저장 여부를 결정하는 관련성 필터
//!
//! 저장은 at-most-once입니다. 퇴출과 커밋 사이에 프로세스가 죽으면
//! 해당 버킷은 유실됩니다 (의도된 트레이드오프). 싱크 에러는 로깅 후
//! 해당 레코드/버킷을 드롭하며 재시도 큐나 프로듀서 배압은 없습니다.

pub mod memory;
pub mod mysql;
pub mod relevance;
pub mod schema;

use async_trait::async_trait;

use tailpost_core::error::StorageError;
use tailpost_core::types::RequestRecord;
use tailpost_metrics::{EvictedBucket, MemoryInfo, UptimeInfo};

pub use memory::MemorySink;
pub use mysql::MySqlSink;
pub use relevance::is_relevant_for_raw_log;

/// 분석 데이터 저장 싱크
///
/// 프로세스 전역에서 공유될 수 있도록 dyn-호환으로 정의합니다.
/// 도메인 id 캐시와 커넥션은 구현체 내부에서 직렬화됩니다.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// 도메인 id를 조회하거나 새로 만듭니다.
    ///
    /// `window_size_minutes`는 최초 생성 시에만 기록됩니다. 이후 변경은
    /// 수동 DB 업데이트가 필요합니다.
    async fn get_or_create_domain_id(
        &self,
        domain_name: &str,
        window_size_minutes: u32,
    ) -> Result<i64, StorageError>;

    /// 로그 파일 id를 조회하거나 새로 만듭니다.
    async fn get_or_create_file_id(
        &self,
        domain_id: i64,
        host_name: &str,
        file_path: &str,
    ) -> Result<i64, StorageError>;

    /// 퇴출된 메트릭 버킷을 저장합니다.
    ///
    /// `replace_if_exists`가 true면 키 충돌 시 값을 교체하고,
    /// false면 기존 값에 더합니다.
    async fn save_metric(
        &self,
        bucket: &EvictedBucket,
        domain_id: i64,
        replace_if_exists: bool,
    ) -> Result<(), StorageError>;

    /// 파싱된 요청 레코드를 raw 로그로 저장합니다.
    ///
    /// `mask_ips`가 true면 클라이언트 IP를 저장하지 않고, UA 문자열은
    /// 앞이 아니라 뒤에서 100바이트를 유지합니다.
    async fn save_raw_log(
        &self,
        record: &RequestRecord,
        domain_id: i64,
        host_id: i64,
        mask_ips: bool,
    ) -> Result<(), StorageError>;

    /// OS 메트릭 스냅샷을 저장합니다. `memory`는 수집 실패 시 `None`.
    async fn save_os_metrics(
        &self,
        uptime: &UptimeInfo,
        memory: Option<&MemoryInfo>,
        host_id: i64,
    ) -> Result<(), StorageError>;
}

/// 문자열을 컬럼 최대 바이트 길이로 자릅니다 (앞부분 유지).
///
/// UTF-8 문자 경계를 넘지 않도록 내림 처리합니다.
pub fn truncate_to_column(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// 문자열을 컬럼 최대 바이트 길이로 자릅니다 (뒷부분 유지).
///
/// IP 마스킹 모드에서 UA 문자열에 사용됩니다. UA의 식별력 있는 부분은
/// 주로 꼬리에 있습니다.
pub fn truncate_keeping_tail(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut start = value.len() - max_bytes;
    while start < value.len() && !value.is_char_boundary(start) {
        start += 1;
    }
    &value[start..]
}

/// raw_logs의 path3 컬럼 값: path3 → path2 → path1 순서로 첫 비어있지
/// 않은 프리픽스를 사용합니다.
pub fn deepest_path_prefix(record: &RequestRecord) -> &str {
    if !record.path3.is_empty() {
        &record.path3
    } else if !record.path2.is_empty() {
        &record.path2
    } else {
        &record.path1
    }
}
