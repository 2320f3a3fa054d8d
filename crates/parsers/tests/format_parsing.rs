//! 형식 파싱 통합 테스트
//!
//! 실서버 접근 로그에서 가져온 형태의 라인 묶음으로 다섯 형식과
//! 감지기, 경로/referer/UA 유도를 한꺼번에 검증합니다.

use tailpost_core::types::{DeviceType, Human, Intent, Malicious, OsFamily, UaFamily};
use tailpost_parsers::{
    parse_apache_combined, parse_apache_common, parse_apache_vhost_combined, parse_nginx_combined,
    parse_nginx_custom, FormatDetector,
};

const APACHE_COMMON: &str =
    r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326"#;

const APACHE_COMBINED: &str = r#"149.102.254.35 - - [23/May/2025:03:53:41 +0000] "GET /wp-content/plugins/helloapx/wp-apxupx.php?apx=upx HTTP/1.1" 404 363 "https://casualgames.dev/wp-content/plugins/helloapx/wp-apxupx.php?apx=upx" "Go-http-client/1.1""#;

const APACHE_VHOST: &str = r#"example.com:80 127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326 "http://www.example.com/start.html" "Mozilla/4.08 [en] (Win98; I ;Nav)""#;

const NGINX_COMBINED: &str = r#"127.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.1" 200 612 "-" "Mozilla/5.0 (Macintosh)""#;

const NGINX_CUSTOM: &str = r#"127.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.1" 200 612 "-" "Mozilla/5.0" 0.123 0.456"#;

#[test]
fn every_format_parses_its_reference_line() {
    assert!(parse_apache_common(APACHE_COMMON).is_ok());
    assert!(parse_apache_combined(APACHE_COMBINED).is_ok());
    assert!(parse_apache_vhost_combined(APACHE_VHOST).is_ok());
    assert!(parse_nginx_combined(NGINX_COMBINED).is_ok());
    assert!(parse_nginx_custom(NGINX_CUSTOM).is_ok());
}

#[test]
fn detector_handles_a_whole_file_of_each_format() {
    for (line, expected_ip) in [
        (APACHE_COMMON, "127.0.0.1"),
        (APACHE_VHOST, "127.0.0.1"),
        (NGINX_CUSTOM, "127.0.0.1"),
    ] {
        let mut detector = FormatDetector::new();
        for _ in 0..3 {
            let record = detector.parse_line(line).unwrap();
            assert_eq!(record.client_ip, expected_ip);
        }
        assert!(detector.locked_format().is_some());
    }
}

#[test]
fn wordpress_probe_line_decomposes_fully() {
    let record = parse_apache_combined(APACHE_COMBINED).unwrap();
    assert_eq!(record.client_ip, "149.102.254.35");
    assert_eq!(record.method, "GET");
    assert_eq!(record.path, "/wp-content/plugins/helloapx/wp-apxupx.php");
    assert_eq!(record.path1, "/wp-content");
    assert_eq!(record.path2, "/wp-content/plugins");
    assert_eq!(record.path3, "/wp-content/plugins/helloapx");
    assert_eq!(record.status, "404");
    assert_eq!(record.bytes_sent, 363);
    assert_eq!(record.referer, "casualgames.dev");
    assert_eq!(record.user_agent.family, UaFamily::Script);
    assert_eq!(record.user_agent.human, Human::NotHuman);
}

#[test]
fn vhost_line_keeps_domain_and_strips_www_referer() {
    let record = parse_apache_vhost_combined(APACHE_VHOST).unwrap();
    assert_eq!(record.domain.as_deref(), Some("example.com:80"));
    assert_eq!(record.referer, "example.com");
    assert_eq!(record.remote_user, "frank");
}

#[test]
fn path_prefix_containment_over_a_corpus() {
    let corpus = [
        r#"10.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.1" 200 1 "-" "curl/8.0""#,
        r#"10.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET /a HTTP/1.1" 200 1 "-" "curl/8.0""#,
        r#"10.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET /a/b HTTP/1.1" 200 1 "-" "curl/8.0""#,
        r#"10.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET /a/b/c HTTP/1.1" 200 1 "-" "curl/8.0""#,
        r#"10.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET /a/b/c/d/e.html?x=1 HTTP/1.1" 200 1 "-" "curl/8.0""#,
    ];
    for line in corpus {
        let record = parse_apache_combined(line).unwrap();
        if !record.path.is_empty() {
            assert!(!record.path1.is_empty(), "{line}");
        }
        if !record.path2.is_empty() {
            assert!(record.path2.starts_with(&record.path1), "{line}");
        }
        if !record.path3.is_empty() {
            assert!(record.path3.starts_with(&record.path2), "{line}");
        }
    }
}

#[test]
fn malicious_classification_over_scanner_traffic() {
    let cases = [
        (
            r#"1.2.3.4 - - [23/May/2025:03:53:41 +0000] "GET /cgi-bin/../../../../etc/passwd HTTP/1.1" 403 0 "-" "curl/8.0""#,
            Malicious::Traversal,
        ),
        (
            r#"1.2.3.4 - - [23/May/2025:03:53:41 +0000] "GET /search?q=<script>document.cookie</script> HTTP/1.1" 200 12 "-" "curl/8.0""#,
            Malicious::Xss,
        ),
        (
            r#"1.2.3.4 - - [23/May/2025:03:53:41 +0000] "GET /product?id=1'+union+select;exec HTTP/1.1" 500 0 "-" "curl/8.0""#,
            Malicious::SqlInj,
        ),
        (
            r#"1.2.3.4 - - [23/May/2025:03:53:41 +0000] "GET /healthy/path HTTP/1.1" 200 5 "-" "curl/8.0""#,
            Malicious::None,
        ),
    ];
    for (line, expected) in cases {
        let record = parse_apache_combined(line).unwrap();
        assert_eq!(record.malicious, expected, "{line}");
    }
}

#[test]
fn bot_traffic_is_fully_tagged() {
    let line = r#"66.249.66.1 - - [23/May/2025:03:53:41 +0000] "GET /robots.txt HTTP/1.1" 200 112 "-" "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)""#;
    let record = parse_apache_combined(line).unwrap();
    let ua = &record.user_agent;
    assert_eq!(ua.family, UaFamily::SearchBot);
    assert_eq!(ua.device_type, DeviceType::Script);
    assert_eq!(ua.os, OsFamily::Other);
    assert_eq!(ua.human, Human::NotHuman);
    assert_eq!(ua.intent, Intent::Processing);
}

#[test]
fn ai_crawler_traffic_is_tagged() {
    let line = r#"52.70.0.1 - - [23/May/2025:03:53:41 +0000] "GET /article HTTP/1.1" 200 9001 "-" "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko); compatible; GPTBot/1.1; +https://openai.com/gptbot""#;
    let record = parse_apache_combined(line).unwrap();
    assert_eq!(record.user_agent.family, UaFamily::AiBot);
    assert_eq!(record.user_agent.intent, Intent::Processing);
}

#[test]
fn remote_user_and_logname_survive_parsing() {
    let line = r#"127.0.0.1 ident alice [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.0" 200 10"#;
    let record = parse_apache_common(line).unwrap();
    assert_eq!(record.remote_logname, "ident");
    assert_eq!(record.remote_user, "alice");
}

#[test]
fn status_stays_a_string_for_prefix_tests() {
    let record = parse_apache_common(APACHE_COMMON).unwrap();
    assert!(record.status.starts_with('2'));
    assert_eq!(record.status.len(), 3);
}
