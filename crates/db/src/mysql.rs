//! MySQL 싱크 구현
//!
//! `sqlx` MySQL 드라이버 위에 [`AnalyticsSink`]를 구현합니다.
//! 도메인 id는 프로세스 전역 캐시로 보관하여 레코드마다 DB 왕복을
//! 피합니다.
//!
//! # 스키마 계약
//! - `domains(domain_id PK, domain_name UNIQUE, created, time_window_size_minutes)`
//! - `log_files(file_id PK, domain_id, host_name, file_path, created)`
//! - `metrics(domain_id, metric_type, key_value, time_window, metric_value, created)`
//!   — `(domain_id, metric_type, key_value, time_window)` 유니크,
//!   충돌 시 모드에 따라 교체 또는 누적
//! - `raw_logs(...)` — client_ip는 `INET6_ATON`으로 바이너리 저장
//! - `os_metrics(...)`

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use tokio::sync::Mutex;
use tracing::{debug, error};

use tailpost_core::error::StorageError;
use tailpost_core::types::RequestRecord;
use tailpost_metrics::{EvictedBucket, MemoryInfo, UptimeInfo};

use crate::{deepest_path_prefix, truncate_keeping_tail, truncate_to_column, AnalyticsSink};

/// MySQL 기반 분석 싱크
pub struct MySqlSink {
    pool: MySqlPool,
    domain_ids: Mutex<HashMap<String, i64>>,
}

impl MySqlSink {
    /// DB에 접속하고 연결을 확인합니다.
    pub async fn connect(
        user: &str,
        password: &str,
        address: &str,
        database: &str,
    ) -> Result<Self, StorageError> {
        let url = format!("mysql://{user}:{password}@{address}/{database}");
        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        // 접속 확인
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            domain_ids: Mutex::new(HashMap::new()),
        })
    }

    /// 이미 생성된 풀로 싱크를 만듭니다 (테스트용).
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            domain_ids: Mutex::new(HashMap::new()),
        }
    }

    /// 계약된 테이블들을 생성합니다 (이미 있으면 no-op).
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        for ddl in crate::schema::ALL_TABLES {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for MySqlSink {
    async fn get_or_create_domain_id(
        &self,
        domain_name: &str,
        window_size_minutes: u32,
    ) -> Result<i64, StorageError> {
        let mut cache = self.domain_ids.lock().await;
        if let Some(id) = cache.get(domain_name) {
            return Ok(*id);
        }

        // time_window_size_minutes는 최초 생성 시에만 기록됨.
        // 이후 값을 바꾸려면 수동 DB 업데이트가 필요함
        let insert = sqlx::query(
            "INSERT INTO domains (domain_name, created, time_window_size_minutes) \
             VALUES (?, NOW(), ?)",
        )
        .bind(truncate_to_column(domain_name, 255))
        .bind(window_size_minutes)
        .execute(&self.pool)
        .await;

        let domain_id = match insert {
            Ok(result) => result.last_insert_id() as i64,
            Err(_) => {
                // 이미 존재. 조회로 대체
                let row = sqlx::query("SELECT domain_id FROM domains WHERE domain_name = ?")
                    .bind(domain_name)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| {
                        error!(domain_name, error = %e, "domain insert and select both failed");
                        StorageError::Query(e.to_string())
                    })?;
                row.get::<i64, _>(0)
            }
        };

        cache.insert(domain_name.to_owned(), domain_id);
        Ok(domain_id)
    }

    async fn get_or_create_file_id(
        &self,
        domain_id: i64,
        host_name: &str,
        file_path: &str,
    ) -> Result<i64, StorageError> {
        let insert = sqlx::query(
            "INSERT INTO log_files (domain_id, host_name, file_path, created) \
             VALUES (?, ?, ?, NOW())",
        )
        .bind(domain_id)
        .bind(host_name)
        .bind(file_path)
        .execute(&self.pool)
        .await;

        match insert {
            Ok(result) => Ok(result.last_insert_id() as i64),
            Err(_) => {
                let row = sqlx::query(
                    "SELECT file_id FROM log_files \
                     WHERE domain_id = ? AND host_name = ? AND file_path = ?",
                )
                .bind(domain_id)
                .bind(host_name)
                .bind(file_path)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!(domain_id, host_name, file_path, error = %e,
                        "log file insert and select both failed");
                    StorageError::Query(e.to_string())
                })?;
                Ok(row.get::<i64, _>(0))
            }
        }
    }

    async fn save_metric(
        &self,
        bucket: &EvictedBucket,
        domain_id: i64,
        replace_if_exists: bool,
    ) -> Result<(), StorageError> {
        let sql = if replace_if_exists {
            "INSERT INTO metrics (domain_id, metric_type, key_value, time_window, metric_value, created) \
             VALUES (?, ?, ?, ?, ?, NOW()) \
             ON DUPLICATE KEY UPDATE metric_value = VALUES(metric_value)"
        } else {
            "INSERT INTO metrics (domain_id, metric_type, key_value, time_window, metric_value, created) \
             VALUES (?, ?, ?, ?, ?, NOW()) \
             ON DUPLICATE KEY UPDATE metric_value = metric_value + VALUES(metric_value)"
        };

        sqlx::query(sql)
            .bind(domain_id)
            .bind(bucket.metric_type)
            .bind(truncate_to_column(&bucket.key_value, 100))
            .bind(bucket.time_window)
            .bind(bucket.value)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(domain_id, file_path = %bucket.file_path, error = %e, "save_metric failed");
                StorageError::Query(e.to_string())
            })?;

        debug!(domain_id, metric_type = bucket.metric_type, time_window = bucket.time_window,
            "metric bucket saved");
        Ok(())
    }

    async fn save_raw_log(
        &self,
        record: &RequestRecord,
        domain_id: i64,
        host_id: i64,
        mask_ips: bool,
    ) -> Result<(), StorageError> {
        let client_ip_expr = if mask_ips { "NULL" } else { "INET6_ATON(?)" };
        let sql = format!(
            "INSERT INTO raw_logs (domain_id, host_id, request_ts, client_ip, remote_user, \
             http_method, path3, request_uri, http_status, bytes_sent, referer, is_malicious, \
             ua_string, ua_os, ua_family, ua_device_type, ua_is_human, ua_intent) \
             VALUES (?, ?, ?, {client_ip_expr}, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        // 마스킹 시에는 UA의 꼬리를 유지 (식별력 있는 부분이 꼬리에 있음)
        let ua_string = if mask_ips {
            truncate_keeping_tail(&record.user_agent.full, 100)
        } else {
            truncate_to_column(&record.user_agent.full, 100)
        };

        let mut query = sqlx::query(&sql)
            .bind(domain_id)
            .bind(host_id)
            .bind(record.timestamp.with_timezone(&Utc));
        if !mask_ips {
            query = query.bind(record.client_ip.clone());
        }
        query = query
            .bind(truncate_to_column(&record.remote_user, 100))
            .bind(truncate_to_column(&record.method, 20))
            .bind(truncate_to_column(deepest_path_prefix(record), 100))
            .bind(truncate_to_column(&record.path, 100))
            .bind(record.status.clone())
            .bind(record.bytes_sent)
            .bind(truncate_to_column(&record.referer, 100))
            .bind(record.malicious.code())
            .bind(ua_string)
            .bind(record.user_agent.os.as_tag())
            .bind(record.user_agent.family.as_tag())
            .bind(record.user_agent.device_type.as_tag())
            .bind(record.user_agent.human.as_tag())
            .bind(record.user_agent.intent.as_tag());

        query.execute(&self.pool).await.map_err(|e| {
            error!(domain_id, host_id, timestamp = %record.timestamp, error = %e,
                "save_raw_log failed");
            StorageError::Query(e.to_string())
        })?;

        Ok(())
    }

    async fn save_os_metrics(
        &self,
        uptime: &UptimeInfo,
        memory: Option<&MemoryInfo>,
        host_id: i64,
    ) -> Result<(), StorageError> {
        let memory = memory.cloned().unwrap_or_default();

        sqlx::query(
            "INSERT INTO os_metrics (host_id, metrics_ts, up_duration_minutes, users, \
             load_average1, load_average5, load_average15, \
             swap_use, cache_use, memory_use, memory_free, memory_available) \
             VALUES (?, NOW(), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(host_id)
        .bind(uptime.up_duration_minutes)
        .bind(uptime.users)
        .bind(&uptime.load_average1)
        .bind(&uptime.load_average5)
        .bind(&uptime.load_average15)
        .bind(memory.swap_use)
        .bind(memory.cache_use)
        .bind(memory.mem_use)
        .bind(memory.mem_free)
        .bind(memory.mem_available)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(host_id, error = %e, "save_os_metrics failed");
            StorageError::Query(e.to_string())
        })?;

        Ok(())
    }
}
