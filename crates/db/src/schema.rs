//! 데이터베이스 스키마 정의
//!
//! 싱크가 준수해야 하는 테이블 계약입니다. `MySqlSink::ensure_schema`가
//! 시작 시점에 실행할 수 있습니다. 기존 설치와의 호환을 위해 모두
//! `CREATE TABLE IF NOT EXISTS`입니다.

/// 도메인 테이블. `domain_name`은 유니크
pub const CREATE_DOMAINS: &str = r#"
CREATE TABLE IF NOT EXISTS domains (
    domain_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    domain_name VARCHAR(255) NOT NULL,
    created DATETIME NOT NULL,
    time_window_size_minutes INT NOT NULL,
    UNIQUE KEY uq_domains_name (domain_name)
)
"#;

/// 로그 파일 테이블. (domain_id, host_name, file_path) 유니크
pub const CREATE_LOG_FILES: &str = r#"
CREATE TABLE IF NOT EXISTS log_files (
    file_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    domain_id BIGINT NOT NULL,
    host_name VARCHAR(255) NOT NULL,
    file_path VARCHAR(255) NOT NULL,
    created DATETIME NOT NULL,
    UNIQUE KEY uq_log_files (domain_id, host_name, file_path)
)
"#;

/// 메트릭 테이블. 유니크 키 충돌 시 교체 또는 누적은 싱크 모드가 결정
pub const CREATE_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS metrics (
    domain_id BIGINT NOT NULL,
    metric_type INT NOT NULL,
    key_value VARCHAR(100) NOT NULL,
    time_window BIGINT NOT NULL,
    metric_value BIGINT NOT NULL,
    created DATETIME NOT NULL,
    UNIQUE KEY uq_metrics (domain_id, metric_type, key_value, time_window)
)
"#;

/// raw 로그 테이블. client_ip는 INET6_ATON 바이너리 (IPv4/IPv6)
pub const CREATE_RAW_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS raw_logs (
    domain_id BIGINT NOT NULL,
    host_id BIGINT NOT NULL,
    request_ts DATETIME NOT NULL,
    client_ip VARBINARY(16) NULL,
    remote_user VARCHAR(100),
    http_method VARCHAR(20),
    path3 VARCHAR(100),
    request_uri VARCHAR(100),
    http_status VARCHAR(3),
    bytes_sent BIGINT,
    referer VARCHAR(100),
    is_malicious INT NOT NULL,
    ua_string VARCHAR(100),
    ua_os VARCHAR(20),
    ua_family VARCHAR(20),
    ua_device_type VARCHAR(20),
    ua_is_human VARCHAR(20),
    ua_intent VARCHAR(20)
)
"#;

/// OS 메트릭 테이블
pub const CREATE_OS_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS os_metrics (
    host_id BIGINT NOT NULL,
    metrics_ts DATETIME NOT NULL,
    up_duration_minutes BIGINT,
    users BIGINT,
    load_average1 VARCHAR(20),
    load_average5 VARCHAR(20),
    load_average15 VARCHAR(20),
    swap_use BIGINT,
    cache_use BIGINT,
    memory_use BIGINT,
    memory_free BIGINT,
    memory_available BIGINT
)
"#;

/// 시간 기반 조회용 인덱스
pub const CREATE_INDEX_METRICS_WINDOW: &str =
    "CREATE INDEX idx_metrics_window ON metrics(domain_id, time_window)";

/// raw 로그 타임스탬프 인덱스
pub const CREATE_INDEX_RAW_LOGS_TS: &str =
    "CREATE INDEX idx_raw_logs_ts ON raw_logs(domain_id, request_ts)";

/// 전체 테이블 DDL 목록 (실행 순서대로)
pub const ALL_TABLES: &[&str] = &[
    CREATE_DOMAINS,
    CREATE_LOG_FILES,
    CREATE_METRICS,
    CREATE_RAW_LOGS,
    CREATE_OS_METRICS,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tables_are_idempotent() {
        for ddl in ALL_TABLES {
            assert!(ddl.contains("IF NOT EXISTS"), "{ddl}");
        }
    }

    #[test]
    fn schema_covers_every_contract_table() {
        let ddl: String = ALL_TABLES.concat();
        for table in ["domains", "log_files", "metrics", "raw_logs", "os_metrics"] {
            assert!(ddl.contains(table), "missing table {table}");
        }
    }

    #[test]
    fn column_limits_match_truncation_limits() {
        // 도메인 255, 일반 텍스트 100, 짧은 태그 20
        assert!(CREATE_DOMAINS.contains("VARCHAR(255)"));
        assert!(CREATE_METRICS.contains("VARCHAR(100)"));
        assert!(CREATE_RAW_LOGS.contains("ua_os VARCHAR(20)"));
        assert!(CREATE_RAW_LOGS.contains("ua_string VARCHAR(100)"));
    }

    #[test]
    fn metrics_unique_key_matches_upsert_contract() {
        assert!(CREATE_METRICS.contains("domain_id, metric_type, key_value, time_window"));
    }
}
