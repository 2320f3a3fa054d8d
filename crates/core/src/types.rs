//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 파싱된 접근 로그 한 줄은 [`RequestRecord`]로 표현됩니다.
//! 유저 에이전트 분류 결과([`UserAgent`])와 악성 요청 태그([`Malicious`])는
//! 카운터 핸들러, 메트릭 집계기, 저장 싱크가 공유하는 형식입니다.

use std::fmt;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// 파싱된 HTTP 접근 로그 레코드
///
/// 각 로그 형식 파서가 생성하며, 모든 핸들러가 소비하는 중간 형식입니다.
/// `path1`/`path2`/`path3`는 경로의 누적 프리픽스입니다.
/// 예: `/a/b/c/d.html` → `path1=/a`, `path2=/a/b`, `path3=/a/b/c`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    /// 도메인 (vhost combined 형식에서만 존재)
    pub domain: Option<String>,
    /// 클라이언트 IP
    pub client_ip: String,
    /// Remote logname (identd). 대부분 "-"
    pub remote_logname: String,
    /// 인증된 원격 사용자. "-"는 비어있음을 의미
    pub remote_user: String,
    /// 요청 시각 (타임존 포함)
    pub timestamp: DateTime<FixedOffset>,
    /// HTTP 메서드
    pub method: String,
    /// 요청 경로 (쿼리 스트링 제거됨)
    pub path: String,
    /// 경로 1단계 프리픽스
    pub path1: String,
    /// 경로 2단계 프리픽스
    pub path2: String,
    /// 경로 3단계 프리픽스
    pub path3: String,
    /// 프로토콜 (예: HTTP/1.1)
    pub protocol: String,
    /// HTTP 상태 코드. "2xx" 프리픽스 검사가 저렴하도록 문자열로 유지
    pub status: String,
    /// 전송 바이트 수
    pub bytes_sent: u64,
    /// 유도된 referer: utm_source 값, 아니면 referer 호스트 (www. 제거), 아니면 빈 문자열
    pub referer: String,
    /// 유저 에이전트 분류 결과
    pub user_agent: UserAgent,
    /// 악성 요청 태그
    pub malicious: Malicious,
}

impl RequestRecord {
    /// 빈 레코드를 생성합니다. 파서가 필드를 채워 넣습니다.
    pub fn new() -> Self {
        Self {
            domain: None,
            client_ip: String::new(),
            remote_logname: String::new(),
            remote_user: String::new(),
            timestamp: epoch_timestamp(),
            method: String::new(),
            path: String::new(),
            path1: String::new(),
            path2: String::new(),
            path3: String::new(),
            protocol: String::new(),
            status: String::new(),
            bytes_sent: 0,
            referer: String::new(),
            user_agent: UserAgent::default(),
            malicious: Malicious::None,
        }
    }
}

impl Default for RequestRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{} {} {}\" {} {}",
            self.client_ip, self.method, self.path, self.protocol, self.status, self.bytes_sent,
        )
    }
}

/// 타임스탬프 파싱 실패 시 사용되는 epoch 기준값
///
/// 집계기는 이 값도 결정적으로 버킷팅하지만 결과 버킷은 의미가 없습니다.
/// 복구 경로가 아니라 문서화된 아티팩트입니다.
pub fn epoch_timestamp() -> DateTime<FixedOffset> {
    Utc.timestamp_opt(0, 0).unwrap().fixed_offset()
}

/// 유저 에이전트 분류 결과
///
/// 원본 헤더 문자열과 5개의 분류 태그를 담습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
    /// 원본 User-Agent 헤더
    pub full: String,
    /// 운영체제 계열
    pub os: OsFamily,
    /// 브라우저/봇 계열
    pub family: UaFamily,
    /// 디바이스 유형
    pub device_type: DeviceType,
    /// 사람 여부
    pub human: Human,
    /// 요청 의도
    pub intent: Intent,
}

/// 브라우저/봇 계열
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UaFamily {
    /// 분류되지 않음
    #[default]
    Other,
    Chrome,
    Firefox,
    Safari,
    Edge,
    /// 검색엔진 봇 (googlebot, bingbot 등)
    SearchBot,
    /// AI 크롤러 (gptbot, claudebot 등)
    AiBot,
    /// 스크립트 클라이언트 (curl, python 등)
    Script,
    /// 소셜 미디어 봇 (facebookexternalhit 등)
    SocialBot,
    /// 기타 봇
    OtherBot,
    /// SEO 크롤러 (ahrefsbot, semrushbot 등)
    SeoBot,
    /// 보안 스캐너 (nmap, zgrab 등)
    Scanner,
}

impl UaFamily {
    /// 저장 컬럼용 짧은 태그 (20바이트 이하)
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Other => "Other",
            Self::Chrome => "Chrome",
            Self::Firefox => "Firefox",
            Self::Safari => "Safari",
            Self::Edge => "Edge",
            Self::SearchBot => "SearchBot",
            Self::AiBot => "AIBot",
            Self::Script => "Script",
            Self::SocialBot => "SocialBot",
            Self::OtherBot => "OtherBot",
            Self::SeoBot => "SEOBot",
            Self::Scanner => "Scanner",
        }
    }
}

impl fmt::Display for UaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// 운영체제 계열
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    #[default]
    Other,
    Windows,
    MacOS,
    Linux,
    Android,
    Ios,
}

impl OsFamily {
    /// 저장 컬럼용 짧은 태그 (20바이트 이하)
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Other => "Other",
            Self::Windows => "Windows",
            Self::MacOS => "MacOS",
            Self::Linux => "Linux",
            Self::Android => "Android",
            Self::Ios => "iOS",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// 디바이스 유형
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    Unknown,
    Desktop,
    Mobile,
    /// 봇/스크립트 트래픽
    Script,
}

impl DeviceType {
    /// 저장 컬럼용 짧은 태그 (20바이트 이하)
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Desktop => "Desktop",
            Self::Mobile => "Mobile",
            Self::Script => "Script",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// 사람 여부 판정
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Human {
    #[default]
    Unknown,
    Human,
    NotHuman,
}

impl Human {
    /// 저장 컬럼용 짧은 태그 (20바이트 이하)
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Human => "Human",
            Self::NotHuman => "NotHuman",
        }
    }
}

impl fmt::Display for Human {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// 요청 의도
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[default]
    Unknown,
    /// 콘텐츠 수집 (스크래핑)
    Scraping,
    /// 악성 시도
    Malicious,
    /// 취약점/포트 스캐닝
    Scanning,
    /// 검색 인덱싱, AI 학습 등 자동 처리
    Processing,
}

impl Intent {
    /// 저장 컬럼용 짧은 태그 (20바이트 이하)
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Scraping => "Scraping",
            Self::Malicious => "Malicious",
            Self::Scanning => "Scanning",
            Self::Processing => "Processing",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// 악성 요청 태그
///
/// 우선순위가 가장 높은 하나만 기록됩니다 (재분류 없음).
/// 숫자 코드는 저장 형식이며 릴리스 간 안정적입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Malicious {
    /// 의심 없음
    #[default]
    None,
    /// URI 구조 파싱 실패
    Invalid,
    /// SQL 인젝션 패턴
    SqlInj,
    /// XSS 패턴
    Xss,
    /// 디렉토리 순회 패턴
    Traversal,
    /// 스캐닝 행위
    Scan,
}

impl Malicious {
    /// 저장용 숫자 코드
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Invalid => 1,
            Self::SqlInj => 10,
            Self::Xss => 20,
            Self::Traversal => 30,
            Self::Scan => 40,
        }
    }

    /// 악성으로 표시되었는지 확인합니다.
    pub fn is_flagged(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Malicious {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Invalid => write!(f, "invalid"),
            Self::SqlInj => write!(f, "sql-injection"),
            Self::Xss => write!(f, "xss"),
            Self::Traversal => write!(f, "traversal"),
            Self::Scan => write!(f, "scan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_has_epoch_timestamp() {
        let record = RequestRecord::new();
        assert_eq!(record.timestamp.timestamp(), 0);
        assert_eq!(record.malicious, Malicious::None);
        assert!(record.domain.is_none());
    }

    #[test]
    fn record_display() {
        let mut record = RequestRecord::new();
        record.client_ip = "127.0.0.1".to_owned();
        record.method = "GET".to_owned();
        record.path = "/index.html".to_owned();
        record.protocol = "HTTP/1.1".to_owned();
        record.status = "200".to_owned();
        record.bytes_sent = 2326;
        let display = record.to_string();
        assert!(display.contains("127.0.0.1"));
        assert!(display.contains("GET /index.html HTTP/1.1"));
        assert!(display.contains("200"));
    }

    #[test]
    fn malicious_codes_are_stable() {
        assert_eq!(Malicious::None.code(), 0);
        assert_eq!(Malicious::Invalid.code(), 1);
        assert_eq!(Malicious::SqlInj.code(), 10);
        assert_eq!(Malicious::Xss.code(), 20);
        assert_eq!(Malicious::Traversal.code(), 30);
        assert_eq!(Malicious::Scan.code(), 40);
    }

    #[test]
    fn malicious_flag_check() {
        assert!(!Malicious::None.is_flagged());
        assert!(Malicious::Invalid.is_flagged());
        assert!(Malicious::Traversal.is_flagged());
    }

    #[test]
    fn tags_fit_short_columns() {
        // 저장 컬럼은 20바이트 제한
        for family in [
            UaFamily::Other,
            UaFamily::Chrome,
            UaFamily::Firefox,
            UaFamily::Safari,
            UaFamily::Edge,
            UaFamily::SearchBot,
            UaFamily::AiBot,
            UaFamily::Script,
            UaFamily::SocialBot,
            UaFamily::OtherBot,
            UaFamily::SeoBot,
            UaFamily::Scanner,
        ] {
            assert!(family.as_tag().len() <= 20);
        }
        for os in [
            OsFamily::Other,
            OsFamily::Windows,
            OsFamily::MacOS,
            OsFamily::Linux,
            OsFamily::Android,
            OsFamily::Ios,
        ] {
            assert!(os.as_tag().len() <= 20);
        }
    }

    #[test]
    fn user_agent_default_is_unknown() {
        let ua = UserAgent::default();
        assert_eq!(ua.family, UaFamily::Other);
        assert_eq!(ua.os, OsFamily::Other);
        assert_eq!(ua.device_type, DeviceType::Unknown);
        assert_eq!(ua.human, Human::Unknown);
        assert_eq!(ua.intent, Intent::Unknown);
    }

    #[test]
    fn record_serialize_roundtrip() {
        let mut record = RequestRecord::new();
        record.client_ip = "10.0.0.1".to_owned();
        record.status = "404".to_owned();
        record.user_agent.family = UaFamily::SearchBot;
        let json = serde_json::to_string(&record).unwrap();
        let deserialized: RequestRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.client_ip, "10.0.0.1");
        assert_eq!(deserialized.status, "404");
        assert_eq!(deserialized.user_agent.family, UaFamily::SearchBot);
    }
}
