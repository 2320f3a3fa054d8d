//! 로그 형식별 파서 — 정규식 기반 라인 파싱
//!
//! 각 파서는 고정된 캡처 그룹 수를 가지며, 매칭에 실패하면
//! [`ParseError::InvalidLogFormat`]을 반환합니다.
//! 타임스탬프가 깨진 라인은 에러가 아니라 epoch 타임스탬프로 기록됩니다
//! (집계기는 이를 결정적으로 버킷팅하지만 결과는 의미가 없습니다).

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use regex::Regex;

use tailpost_core::error::ParseError;
use tailpost_core::types::{epoch_timestamp, RequestRecord};

use crate::request::{apply_referer, apply_request_uri};
use crate::useragent::classify_user_agent;

/// 라인 파서 함수 타입
pub type ParserFn = fn(&str) -> Result<RequestRecord, ParseError>;

static APACHE_COMMON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "(\S+) (\S+) (\S+)" (\d+) (\d+)$"#).unwrap()
});

static APACHE_COMBINED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "(\S+) (\S+) (\S+)" (\d+) (\d+) "([^"]*)" "([^"]*)"$"#,
    )
    .unwrap()
});

static APACHE_VHOST_COMBINED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(\S+) (\S+) (\S+) (\S+) \[([^\]]+)\] "(\S+) (\S+) (\S+)" (\d+) (\d+) "([^"]*)" "([^"]*)"$"#,
    )
    .unwrap()
});

static NGINX_COMBINED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) - (\S+) \[([^\]]+)\] "(\S+) (\S+) (\S+)" (\d+) (\d+) "([^"]*)" "([^"]*)"$"#)
        .unwrap()
});

static NGINX_CUSTOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(\S+) - (\S+) \[([^\]]+)\] "(\S+) (\S+) (\S+)" (\d+) (\d+) "([^"]*)" "([^"]*)" (\S+) (\S+)$"#,
    )
    .unwrap()
});

/// Apache 타임스탬프를 파싱합니다 (`dd/Mon/yyyy:HH:MM:SS ±ZZZZ`).
pub fn parse_apache_timestamp(timestamp: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_str(timestamp, "%d/%b/%Y:%H:%M:%S %z").map_err(|_| {
        ParseError::InvalidTimestamp {
            value: timestamp.to_owned(),
        }
    })
}

/// Nginx 타임스탬프를 파싱합니다. Apache와 동일한 형식입니다.
pub fn parse_nginx_timestamp(timestamp: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    parse_apache_timestamp(timestamp)
}

/// HAProxy 타임스탬프를 파싱합니다 (`dd/Mon/yyyy:HH:MM:SS.mmm`, UTC 가정).
///
/// HAProxy 라인 형식은 아직 연결되어 있지 않습니다. 향후 확장용입니다.
pub fn parse_haproxy_timestamp(timestamp: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    NaiveDateTime::parse_from_str(timestamp, "%d/%b/%Y:%H:%M:%S%.3f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| ParseError::InvalidTimestamp {
            value: timestamp.to_owned(),
        })
}

/// Apache Common Log Format 한 줄을 파싱합니다.
///
/// 예: `127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326`
pub fn parse_apache_common(line: &str) -> Result<RequestRecord, ParseError> {
    let caps = APACHE_COMMON_RE
        .captures(line)
        .ok_or(ParseError::InvalidLogFormat)?;

    let mut record = RequestRecord::new();
    record.client_ip = caps[1].to_owned();
    record.remote_logname = caps[2].to_owned();
    record.remote_user = caps[3].to_owned();
    record.timestamp = parse_apache_timestamp(&caps[4]).unwrap_or_else(|_| epoch_timestamp());
    record.method = caps[5].to_owned();
    record.protocol = caps[7].to_owned();
    record.status = caps[8].to_owned();
    record.bytes_sent = caps[9].parse().unwrap_or(0);

    apply_request_uri(&mut record, &caps[6]);

    Ok(record)
}

/// Apache Combined Log Format 한 줄을 파싱합니다.
///
/// 예: `127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326 "http://www.example.com/start.html" "Mozilla/4.08 [en] (Win98; I ;Nav)"`
pub fn parse_apache_combined(line: &str) -> Result<RequestRecord, ParseError> {
    let caps = APACHE_COMBINED_RE
        .captures(line)
        .ok_or(ParseError::InvalidLogFormat)?;

    let mut record = RequestRecord::new();
    record.client_ip = caps[1].to_owned();
    record.remote_logname = caps[2].to_owned();
    record.remote_user = caps[3].to_owned();
    record.timestamp = parse_apache_timestamp(&caps[4]).unwrap_or_else(|_| epoch_timestamp());
    record.method = caps[5].to_owned();
    record.protocol = caps[7].to_owned();
    record.status = caps[8].to_owned();
    record.bytes_sent = caps[9].parse().unwrap_or(0);

    apply_request_uri(&mut record, &caps[6]);
    apply_referer(&mut record, &caps[10], &caps[6]);
    record.user_agent = classify_user_agent(&caps[11]);

    Ok(record)
}

/// Apache VHost Combined Log Format 한 줄을 파싱합니다.
///
/// combined 형식 앞에 `vhost:port`가 붙습니다. 도메인은 여기서만 채워집니다.
pub fn parse_apache_vhost_combined(line: &str) -> Result<RequestRecord, ParseError> {
    let caps = APACHE_VHOST_COMBINED_RE
        .captures(line)
        .ok_or(ParseError::InvalidLogFormat)?;

    let mut record = RequestRecord::new();
    record.domain = Some(caps[1].to_owned());
    record.client_ip = caps[2].to_owned();
    record.remote_logname = caps[3].to_owned();
    record.remote_user = caps[4].to_owned();
    record.timestamp = parse_apache_timestamp(&caps[5]).unwrap_or_else(|_| epoch_timestamp());
    record.method = caps[6].to_owned();
    record.protocol = caps[8].to_owned();
    record.status = caps[9].to_owned();
    record.bytes_sent = caps[10].parse().unwrap_or(0);

    apply_request_uri(&mut record, &caps[7]);
    apply_referer(&mut record, &caps[11], &caps[7]);
    record.user_agent = classify_user_agent(&caps[12]);

    Ok(record)
}

/// Nginx Combined Log Format 한 줄을 파싱합니다.
///
/// 예: `127.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.1" 200 612 "-" "Mozilla/5.0 (Macintosh)"`
pub fn parse_nginx_combined(line: &str) -> Result<RequestRecord, ParseError> {
    let caps = NGINX_COMBINED_RE
        .captures(line)
        .ok_or(ParseError::InvalidLogFormat)?;

    let mut record = RequestRecord::new();
    record.client_ip = caps[1].to_owned();
    record.remote_user = caps[2].to_owned();
    record.timestamp = parse_nginx_timestamp(&caps[3]).unwrap_or_else(|_| epoch_timestamp());
    record.method = caps[4].to_owned();
    record.protocol = caps[6].to_owned();
    record.status = caps[7].to_owned();
    record.bytes_sent = caps[8].parse().unwrap_or(0);

    apply_request_uri(&mut record, &caps[5]);
    apply_referer(&mut record, &caps[9], &caps[5]);
    record.user_agent = classify_user_agent(&caps[10]);

    Ok(record)
}

/// Nginx Custom Log Format 한 줄을 파싱합니다.
///
/// combined 형식 뒤에 `$request_time $upstream_response_time`이 붙습니다.
/// 두 타이밍 필드는 현재 버리고 있습니다.
pub fn parse_nginx_custom(line: &str) -> Result<RequestRecord, ParseError> {
    let caps = NGINX_CUSTOM_RE
        .captures(line)
        .ok_or(ParseError::InvalidLogFormat)?;

    let mut record = RequestRecord::new();
    record.client_ip = caps[1].to_owned();
    record.remote_user = caps[2].to_owned();
    record.timestamp = parse_nginx_timestamp(&caps[3]).unwrap_or_else(|_| epoch_timestamp());
    record.method = caps[4].to_owned();
    record.protocol = caps[6].to_owned();
    record.status = caps[7].to_owned();
    record.bytes_sent = caps[8].parse().unwrap_or(0);

    apply_request_uri(&mut record, &caps[5]);
    apply_referer(&mut record, &caps[9], &caps[5]);
    record.user_agent = classify_user_agent(&caps[10]);

    Ok(record)
}
