//! 유저 에이전트 분류기
//!
//! 완벽한 UA 데이터베이스가 아니라, 접근 로그 통계에 필요한 수준의
//! 분류만 수행합니다: 주요 브라우저 4종, 봇/스크립트 계열, 상위 수준 OS.
//!
//! # 2단계 규칙
//! - Phase A: 소문자화한 UA 전체에 대한 키워드 매칭. 알려진 봇/스크립트를
//!   우선순위 순서로 판정하며, 첫 매치에서 종료합니다.
//! - Phase B: Phase A가 매칭하지 않은 경우에만 실행. 첫 공백에서 분리한 뒤
//!   괄호 그룹과 `name/version` 토큰을 한 번의 패스로 스캔합니다.
//!   (중첩 정규식 대신 손으로 쓴 스캐너 — 역추적이 없어 빠르고 테스트가 쉽습니다)

use std::sync::LazyLock;

use regex::Regex;

use tailpost_core::types::{DeviceType, Human, Intent, OsFamily, UaFamily, UserAgent};

/// Phase A 키워드 테이블. 순서대로 시도하며 첫 매치에서 멈춥니다.
static PHASE_A_RULES: LazyLock<Vec<(Regex, UaFamily, Intent)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"googlebot|bingbot|baiduspider|yandexbot|duckduckbot").unwrap(),
            UaFamily::SearchBot,
            Intent::Processing,
        ),
        (
            Regex::new(
                r"facebookexternalhit|twitterbot|linkedinbot|pinterestbot|slackbot|bytespider",
            )
            .unwrap(),
            UaFamily::SocialBot,
            Intent::Processing,
        ),
        (
            Regex::new(r"ahrefsbot|semrushbot|dotbot|mj12bot|seobilitybot|siteauditbot").unwrap(),
            UaFamily::SeoBot,
            Intent::Processing,
        ),
        (
            Regex::new(
                r"gptbot|chatgpt|google-extended|claudebot|meta-externalagent|amazonbot|perplexitybot|youbot",
            )
            .unwrap(),
            UaFamily::AiBot,
            Intent::Processing,
        ),
        (
            Regex::new(r"censysinspect|expanse|aliyunsecbot|nmap|masscan|zgrab|shodanbot|urlscan")
                .unwrap(),
            UaFamily::Scanner,
            Intent::Scanning,
        ),
        (
            Regex::new(
                r"curl|scrapy|wget|python|go-http-client|java|ruby|okhttp|postman|axios|guzzlehttp|headlesschrome|phantomjs|cloudflare-traffic-manager",
            )
            .unwrap(),
            UaFamily::Script,
            Intent::Scraping,
        ),
    ]
});

/// UA 문자열을 분류합니다.
pub fn classify_user_agent(ua_string: &str) -> UserAgent {
    let mut ua = UserAgent {
        full: ua_string.to_owned(),
        ..Default::default()
    };

    if phase_a(&mut ua, ua_string) {
        return ua;
    }
    phase_b(&mut ua, ua_string);
    ua
}

/// Phase A: 알려진 봇/스크립트 키워드 매칭. 매치하면 true.
fn phase_a(ua: &mut UserAgent, ua_string: &str) -> bool {
    let lowered = ua_string.to_lowercase();
    for (rule, family, intent) in PHASE_A_RULES.iter() {
        if rule.is_match(&lowered) {
            ua.family = *family;
            ua.device_type = DeviceType::Script;
            ua.human = Human::NotHuman;
            ua.intent = *intent;
            return true;
        }
    }
    false
}

/// Phase B: 구조적 스캔
fn phase_b(ua: &mut UserAgent, ua_string: &str) {
    let Some((_, after)) = ua_string.split_once(' ') else {
        // 공백이 없으면 단일 토큰. 짧은 목록과 대조
        let lowered = ua_string.to_lowercase();
        if lowered.contains("google") {
            ua.family = UaFamily::SearchBot;
        } else if lowered.starts_with("facebook") {
            ua.family = UaFamily::OtherBot;
            ua.device_type = DeviceType::Script;
        } else if lowered.starts_with("meta-") {
            ua.family = UaFamily::AiBot;
            ua.device_type = DeviceType::Script;
        } else if lowered.contains("curl")
            || lowered.starts_with("go-")
            || lowered.contains("java")
            || lowered.contains("apache")
            || lowered.contains("php")
            || lowered.contains("python")
            || lowered.contains("requests")
        {
            ua.family = UaFamily::Script;
        }
        ua.human = Human::NotHuman;
        return;
    };

    let mut found_crios = false;
    let mut found_chrome = false;
    let mut found_safari = false;
    let mut found_firefox = false;
    let mut found_edge = false;

    for token in scan_tokens(after) {
        match token {
            UaToken::Paren(inner) => {
                if inner.starts_with("Windows") {
                    ua.device_type = DeviceType::Desktop;
                    ua.os = OsFamily::Windows;
                } else if inner.starts_with("Mac") {
                    ua.device_type = DeviceType::Desktop;
                    ua.os = OsFamily::MacOS;
                } else if inner.starts_with("iPhone") || inner.starts_with("iPad") {
                    ua.device_type = DeviceType::Mobile;
                    ua.os = OsFamily::Ios;
                } else if inner.contains("Android") {
                    ua.device_type = DeviceType::Mobile;
                    ua.os = OsFamily::Android;
                    if inner.contains("Googlebot") {
                        ua.human = Human::NotHuman;
                    }
                } else if inner.contains("Linux") {
                    ua.device_type = DeviceType::Desktop;
                    ua.os = OsFamily::Linux;
                } else if inner.starts_with("compatible") {
                    apply_compatible_part(ua, inner);
                } else if inner.contains("Claude") {
                    ua.family = UaFamily::AiBot;
                    ua.device_type = DeviceType::Script;
                    ua.human = Human::NotHuman;
                }
            }
            UaToken::Product(product) => {
                if product.starts_with("Chrome") {
                    ua.family = UaFamily::Chrome;
                    found_chrome = true;
                } else if product.starts_with("Safari") {
                    ua.family = UaFamily::Safari;
                    found_safari = true;
                } else if product.starts_with("CriOS") {
                    ua.family = UaFamily::Chrome;
                    ua.os = OsFamily::Ios;
                    found_crios = true;
                } else if product.starts_with("Edg") {
                    ua.family = UaFamily::Edge;
                    ua.os = OsFamily::Windows;
                    found_edge = true;
                } else if product.starts_with("Firefox") {
                    ua.family = UaFamily::Firefox;
                    found_firefox = true;
                } else if product.contains("openai") || product.contains("Claude") {
                    ua.family = UaFamily::AiBot;
                    ua.device_type = DeviceType::Script;
                    ua.human = Human::NotHuman;
                }
            }
        }
    }

    // 토큰 등장 순서와 무관하게 결정되도록 마지막에 우선순위를 적용
    if found_crios {
        ua.family = UaFamily::Chrome;
        ua.os = OsFamily::Ios;
    } else if found_edge {
        ua.family = UaFamily::Edge;
        ua.os = OsFamily::Windows;
    } else if found_safari && found_chrome {
        ua.family = UaFamily::Chrome;
    } else if found_safari && !found_chrome && !found_edge && !found_firefox {
        ua.family = UaFamily::Safari;
    }

    if ua.family == UaFamily::SearchBot || ua.family == UaFamily::OtherBot {
        ua.device_type = DeviceType::Script;
        ua.os = OsFamily::Other;
        ua.human = Human::NotHuman;
    }
}

/// `(compatible; ...)` 그룹 처리
fn apply_compatible_part(ua: &mut UserAgent, part: &str) {
    let lowered = part.to_lowercase();
    if lowered.contains("bot") {
        ua.family = UaFamily::OtherBot;
        ua.device_type = DeviceType::Script;
        ua.human = Human::NotHuman;
        if lowered.contains("blex") {
            ua.family = UaFamily::SeoBot;
            ua.intent = Intent::Processing;
        }
    }
}

/// 스캔 토큰: 괄호 그룹 또는 `name/version` 제품 토큰
#[derive(Debug, PartialEq, Eq)]
enum UaToken<'a> {
    Paren(&'a str),
    Product(&'a str),
}

/// UA 꼬리 부분을 괄호 그룹과 제품 토큰의 나열로 스캔합니다.
///
/// `\s*\(([^)]+)\)|\s*([^/]+/[^ ]+)` 패턴과 동일한 결과를 내는 단일 패스입니다.
/// 닫히지 않은 괄호는 스캔을 종료하고, `/`가 없는 단어는 건너뜁니다.
fn scan_tokens(input: &str) -> Vec<UaToken<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        while pos < input.len() && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos >= input.len() {
            break;
        }
        if bytes[pos] == b'(' {
            match input[pos + 1..].find(')') {
                Some(offset) => {
                    tokens.push(UaToken::Paren(&input[pos + 1..pos + 1 + offset]));
                    pos = pos + offset + 2;
                }
                None => break,
            }
        } else {
            let end = input[pos..]
                .find(' ')
                .map(|offset| pos + offset)
                .unwrap_or(input.len());
            let word = &input[pos..end];
            if let Some(slash) = word.find('/') {
                if slash > 0 && slash + 1 < word.len() {
                    tokens.push(UaToken::Product(word));
                }
            }
            pos = end;
        }
    }

    tokens
}
