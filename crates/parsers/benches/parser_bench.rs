//! 접근 로그 파서 벤치마크
//!
//! 형식별 라인 파싱과 유저 에이전트 분류의 처리량을 측정합니다.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tailpost_parsers::{
    classify_user_agent, parse_apache_combined, parse_apache_common, parse_nginx_combined,
    FormatDetector,
};

/// Apache CLF 라인 (짧은 경로)
const CLF_LINE: &str =
    r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326"#;

/// Apache combined 라인 (referer + 데스크톱 브라우저 UA)
const COMBINED_LINE: &str = r#"203.0.113.45 - - [23/May/2025:03:53:41 +0000] "GET /blog/2025/05/some-article.html?utm_source=newsletter HTTP/1.1" 200 15230 "https://www.example.com/start.html" "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36""#;

/// Nginx combined 라인 (봇 UA)
const NGINX_BOT_LINE: &str = r#"66.249.66.1 - - [23/May/2025:03:53:41 +0000] "GET /robots.txt HTTP/1.1" 200 112 "-" "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)""#;

const UA_CHROME_MACOS: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";
const UA_CRIOS_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_7_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/137.0.7151.51 Mobile/15E148 Safari/604.1";
const UA_GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
const UA_CURL: &str = "curl/8.7.1";

fn bench_line_parsers(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_parsers");

    group.throughput(Throughput::Elements(1));
    group.bench_function("apache_common", |b| {
        b.iter(|| parse_apache_common(black_box(CLF_LINE)).unwrap())
    });
    group.bench_function("apache_combined_browser", |b| {
        b.iter(|| parse_apache_combined(black_box(COMBINED_LINE)).unwrap())
    });
    group.bench_function("nginx_combined_bot", |b| {
        b.iter(|| parse_nginx_combined(black_box(NGINX_BOT_LINE)).unwrap())
    });

    // 1000건 반복 처리량
    group.throughput(Throughput::Elements(1000));
    group.bench_function("throughput_1000_clf", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                parse_apache_common(black_box(CLF_LINE)).unwrap();
            }
        })
    });

    group.finish();
}

fn bench_format_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_detection");
    group.throughput(Throughput::Elements(1));

    // 첫 라인: 모든 형식을 순서대로 시도
    group.bench_function("first_line_lock_in", |b| {
        b.iter(|| {
            let mut detector = FormatDetector::new();
            detector.parse_line(black_box(NGINX_BOT_LINE)).unwrap()
        })
    });

    // lock-in 이후: 고정된 파서만 사용
    group.bench_function("locked_line", |b| {
        let mut detector = FormatDetector::new();
        detector.parse_line(CLF_LINE).unwrap();
        b.iter(|| detector.parse_line(black_box(CLF_LINE)).unwrap())
    });

    group.finish();
}

fn bench_user_agent_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("user_agent");
    group.throughput(Throughput::Elements(1));

    for (name, ua) in [
        ("chrome_macos", UA_CHROME_MACOS),
        ("crios_iphone", UA_CRIOS_IPHONE),
        ("googlebot", UA_GOOGLEBOT),
        ("curl", UA_CURL),
    ] {
        group.bench_with_input(BenchmarkId::new("classify", name), &ua, |b, &input| {
            b.iter(|| classify_user_agent(black_box(input)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_line_parsers,
    bench_format_detection,
    bench_user_agent_classification
);
criterion_main!(benches);
