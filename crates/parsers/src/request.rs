//! 요청 URI 분해 — 경로 프리픽스, referer 유도, 악성 패턴 태깅
//!
//! 파서가 정규식 매칭을 마친 뒤, 요청 URI와 Referer 헤더에서
//! `path`/`path1..3`/`referer`/`malicious` 필드를 채웁니다.
//!
//! # 악성 판정 우선순위
//! Traversal → XSS → SQL 인젝션. 첫 매치가 확정되면 재분류하지 않습니다.
//! URI가 구조적으로 파싱되지 않으면 `Malicious::Invalid`가 되고
//! 경로 분해는 수행되지 않습니다.

use std::sync::LazyLock;

use regex::Regex;

use tailpost_core::types::{Malicious, RequestRecord};

static UTM_SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\?|&)utm_source=([^&]+)(&|$)").unwrap());

static XSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<script|script>|alert|onmouseover|onmouseout").unwrap());

static SQL_INJECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'.*(insert|update|exec|execute)").unwrap());

/// 요청 URI를 분해하여 `path`, `path1..3`, `malicious`를 채웁니다.
///
/// URI가 파싱되지 않으면 `malicious = Invalid`로 표시하고
/// `path`에는 첫 `?` 이전 부분을 그대로 둡니다.
pub fn apply_request_uri(record: &mut RequestRecord, raw_uri: &str) {
    let Some((path, raw_query)) = split_request_uri(raw_uri) else {
        record.malicious = Malicious::Invalid;
        record.path = match raw_uri.split_once('?') {
            Some((before, _)) => before.to_owned(),
            None => raw_uri.to_owned(),
        };
        return;
    };

    record.path = path;

    if !record.path.is_empty() {
        let segments: Vec<&str> = record.path.split('/').collect();
        // 선행 '/' 때문에 segments[0]은 빈 문자열
        if segments.len() == 1 {
            record.path1 = "/".to_owned();
        }
        if segments.len() > 1 {
            record.path1 = format!("/{}", segments[1]);
        }
        if segments.len() > 2 {
            record.path2 = format!("{}/{}", record.path1, segments[2]);
        }
        if segments.len() > 3 {
            record.path3 = format!("{}/{}", record.path2, segments[3]);
        }
    }

    if is_directory_traversal(&record.path, raw_uri) {
        record.malicious = Malicious::Traversal;
    } else if XSS_RE.is_match(raw_query) {
        record.malicious = Malicious::Xss;
    } else if SQL_INJECTION_RE.is_match(raw_query) {
        record.malicious = Malicious::SqlInj;
    }
}

/// referer 필드를 유도합니다.
///
/// 우선순위: 요청 URI의 `utm_source` 파라미터 값 → Referer 헤더의 호스트명
/// (선행 `www.` 제거) → 빈 문자열.
pub fn apply_referer(record: &mut RequestRecord, referer_header: &str, raw_uri: &str) {
    if let Some(caps) = UTM_SOURCE_RE.captures(raw_uri) {
        record.referer = caps[2].to_owned();
        return;
    }
    if !referer_header.is_empty() {
        if let Some(host) = referer_host(referer_header) {
            record.referer = host.strip_prefix("www.").unwrap_or(&host).to_owned();
        }
    }
}

/// 요청 URI를 (디코딩된 경로, 원시 쿼리)로 분리합니다.
///
/// 절대 경로(`/`로 시작)가 아니거나, 제어 문자·공백을 포함하거나,
/// 퍼센트 인코딩이 깨져 있으면 `None`을 반환합니다.
/// CONNECT의 `host:port` 형식이나 포트 스캐너가 보내는 바이너리
/// 페이로드가 여기서 걸러집니다.
fn split_request_uri(raw: &str) -> Option<(String, &str)> {
    if !raw.starts_with('/') {
        return None;
    }
    if raw.chars().any(|c| c.is_control() || c == ' ') {
        return None;
    }
    let (raw_path, raw_query) = match raw.split_once('?') {
        Some((p, q)) => (p, q),
        None => (raw, ""),
    };
    let path = percent_decode(raw_path)?;
    Some((path, raw_query))
}

/// 퍼센트 인코딩을 디코딩합니다. 깨진 시퀀스는 `None`.
fn percent_decode(s: &str) -> Option<String> {
    if !s.contains('%') {
        return Some(s.to_owned());
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return None;
            }
            let hi = (bytes[i + 1] as char).to_digit(16)?;
            let lo = (bytes[i + 2] as char).to_digit(16)?;
            out.push((hi * 16 + lo) as u8);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// 디렉토리 순회 시도 여부를 확인합니다.
///
/// 디코딩된 경로의 `/../` 또는 원시 URI 어디든 `%00`이 있으면 참입니다.
fn is_directory_traversal(decoded_path: &str, raw_uri: &str) -> bool {
    decoded_path.contains("/../") || raw_uri.contains("%00")
}

/// URL에서 호스트명을 추출합니다.
///
/// `scheme://host[:port]/...` 형태만 인식합니다. 스킴이 없으면 `None`.
fn referer_host(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(rest);
    // userinfo 제거
    let host_port = match authority.rsplit_once('@') {
        Some((_, hp)) => hp,
        None => authority,
    };
    // 포트 제거 (IPv6 리터럴은 대괄호 유지)
    let host = if host_port.starts_with('[') {
        host_port.split_once(']').map(|(h, _)| &host_port[1..h.len()])
    } else {
        Some(host_port.split(':').next().unwrap_or(host_port))
    }?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_owned())
}
