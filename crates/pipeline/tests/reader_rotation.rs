//! 라인 리더 로테이션 통합 테스트
//!
//! 실제 디렉토리 watch와 파일 조작으로 follow 모드의 로테이션 복구를
//! 검증합니다. 타이밍에 민감하므로 넉넉한 타임아웃을 둡니다.

use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use tailpost_core::config::StartFrom;
use tailpost_pipeline::LineReader;

const WAIT: Duration = Duration::from_secs(20);

async fn expect_line(rx: &mut mpsc::Receiver<String>, expected: &str) {
    let line = timeout(WAIT, rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for line '{expected}'"))
        .expect("channel closed before expected line");
    assert_eq!(line, expected);
}

#[tokio::test]
async fn follow_survives_log_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("access.log");

    {
        let mut file = std::fs::File::create(&log_path).unwrap();
        writeln!(file, "before rotation 1").unwrap();
    }

    let (tx, mut rx) = mpsc::channel(10);
    let reader = LineReader::new(&log_path, StartFrom::Beginning, true);
    let handle = tokio::spawn(reader.run(tx));

    expect_line(&mut rx, "before rotation 1").await;

    // 로테이션 직전에 추가된 라인: 전환 전에 기존 핸들에서 드레인되어야 함
    {
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(file, "before rotation 2").unwrap();
    }
    expect_line(&mut rx, "before rotation 2").await;

    // 로테이션: 기존 파일을 옮기고 같은 이름으로 새 파일 생성
    let rotated = dir.path().join("access.log.1");
    std::fs::rename(&log_path, &rotated).unwrap();
    {
        let mut file = std::fs::File::create(&log_path).unwrap();
        writeln!(file, "after rotation").unwrap();
    }

    // 새 파일은 오프셋 0부터 읽힘
    expect_line(&mut rx, "after rotation").await;

    drop(rx);
    let _ = timeout(WAIT, handle).await;
}

#[tokio::test]
async fn follow_reads_lines_appended_over_time() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("access.log");
    std::fs::File::create(&log_path).unwrap();

    let (tx, mut rx) = mpsc::channel(10);
    let reader = LineReader::new(&log_path, StartFrom::End, true);
    let handle = tokio::spawn(reader.run(tx));

    // 리더가 대기 상태로 들어갈 시간을 줌
    tokio::time::sleep(Duration::from_millis(300)).await;

    for i in 1..=3 {
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(file, "appended {i}").unwrap();
        drop(file);
        expect_line(&mut rx, &format!("appended {i}")).await;
    }

    drop(rx);
    let _ = timeout(WAIT, handle).await;
}
