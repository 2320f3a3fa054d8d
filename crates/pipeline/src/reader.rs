//! 파일 라인 리더 — tail -f 방식 추적과 로테이션 복구
//!
//! 파일을 한 줄씩 읽어 트림한 뒤 채널로 전달합니다.
//! `follow` 모드에서는 EOF 이후에도 디렉토리 watch 이벤트와 1초 간격의
//! 재시도 루프로 새 데이터를 기다립니다.
//!
//! # 로테이션 복구
//! 같은 베이스네임에 대한 Rename/Remove 이벤트를 받으면
//! 1. 현재 핸들을 EOF까지 마저 읽고
//! 2. 닫은 뒤 1초 간격으로 최대 5회 재열기를 시도하며
//! 3. 성공 시 항상 오프셋 0부터 다시 읽습니다.
//!
//! 재열기 소진, watcher 에러, EOF 외의 I/O 에러는 모두 시퀀스를
//! 종료시킵니다 (채널이 닫혀 소비자에게 전파됨).

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use tailpost_core::config::StartFrom;

/// 버퍼 크기 (8 KiB)
const READ_BUFFER_SIZE: usize = 8192;

/// 로테이션 후 재열기 최대 시도 횟수
const REOPEN_ATTEMPTS: u32 = 5;

/// EOF 대기 중 재시도 간격
const WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// 파일 라인 리더
///
/// `run`이 프로듀서 태스크의 본체입니다. 종료 시 `tx`가 드롭되면서
/// 라인 채널이 닫히고 소비자가 정리 단계로 넘어갑니다.
pub struct LineReader {
    path: PathBuf,
    start_from: StartFrom,
    follow: bool,
}

impl LineReader {
    /// 리더를 생성합니다.
    pub fn new(path: impl Into<PathBuf>, start_from: StartFrom, follow: bool) -> Self {
        Self {
            path: path.into(),
            start_from,
            follow,
        }
    }

    /// 파일을 읽어 트림된 비어있지 않은 라인을 `tx`로 전달합니다.
    ///
    /// 소비자가 수신을 중단하면 (채널 닫힘) 조용히 종료합니다.
    pub async fn run(self, tx: mpsc::Sender<String>) {
        debug!(path = %self.path.display(), "line reader starting");

        // follow 모드에서만 디렉토리 watcher를 설정
        let mut watcher_rx = None;
        let mut _watcher = None;
        if self.follow {
            let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(64);
            let watcher = notify::recommended_watcher(move |res| {
                let _ = event_tx.blocking_send(res);
            });
            let mut watcher = match watcher {
                Ok(w) => w,
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "failed to create watcher");
                    return;
                }
            };
            let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
            let dir = dir.unwrap_or(Path::new("."));
            if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                error!(path = %self.path.display(), error = %e, "failed to watch directory");
                return;
            }
            debug!(dir = %dir.display(), "watching parent directory");
            watcher_rx = Some(event_rx);
            _watcher = Some(watcher);
        }

        let mut reader = match self.open_file(false).await {
            Ok(reader) => reader,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to open file");
                return;
            }
        };

        let base_name = self.path.file_name().map(|n| n.to_owned());
        let mut waiting_for_new_data = false;

        loop {
            if !waiting_for_new_data {
                match read_one_line(&mut reader).await {
                    Ok((line, at_eof)) => {
                        if let Some(line) = line {
                            if tx.send(line).await.is_err() {
                                debug!(path = %self.path.display(), "consumer gone, stopping reader");
                                return;
                            }
                        }
                        if at_eof {
                            if !self.follow {
                                info!(path = %self.path.display(), "finished reading, not following");
                                return;
                            }
                            waiting_for_new_data = true;
                            // 끝으로 이동하며 내부 버퍼도 초기화
                            if let Err(e) = reader.seek(SeekFrom::End(0)).await {
                                error!(path = %self.path.display(), error = %e, "seek to end failed");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        error!(path = %self.path.display(), error = %e, "read error, stopping");
                        return;
                    }
                }
            }

            let Some(event_rx) = watcher_rx.as_mut() else {
                continue;
            };

            match event_rx.try_recv() {
                Ok(Ok(event)) => {
                    let relevant = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == base_name.as_deref());
                    if !relevant {
                        continue;
                    }

                    if matches!(event.kind, EventKind::Modify(notify::event::ModifyKind::Data(_)))
                        || matches!(
                            event.kind,
                            EventKind::Modify(notify::event::ModifyKind::Any)
                        )
                    {
                        // 쓰기 이벤트: 대기 해제하고 계속 읽기
                        debug!(path = %self.path.display(), "file modified, resuming reads");
                        waiting_for_new_data = false;
                        continue;
                    }

                    if matches!(
                        event.kind,
                        EventKind::Remove(_)
                            | EventKind::Modify(notify::event::ModifyKind::Name(_))
                    ) {
                        info!(path = %self.path.display(), "file renamed/removed (log rotation)");

                        // 전환 전에 기존 핸들을 끝까지 읽음
                        self.drain_to_eof(&mut reader, &tx).await;

                        waiting_for_new_data = false;
                        match self.reopen_after_rotation().await {
                            Some(new_reader) => {
                                reader = new_reader;
                                info!(path = %self.path.display(), "reopened file after rotation");
                            }
                            None => {
                                warn!(path = %self.path.display(),
                                    "file rotated away and could not be reopened");
                                return;
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    error!(path = %self.path.display(), error = %e, "watcher error");
                    return;
                }
                Err(mpsc::error::TryRecvError::Empty) => {
                    if waiting_for_new_data {
                        // 1초 쉬고 읽기를 재시도
                        sleep(WAIT_INTERVAL).await;
                        waiting_for_new_data = false;
                    }
                }
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    error!(path = %self.path.display(), "watcher channel closed");
                    return;
                }
            }
        }
    }

    /// 파일을 열고 시작 위치 정책을 적용합니다.
    ///
    /// 로테이션 후 재열기는 정책과 무관하게 항상 오프셋 0부터 시작합니다.
    async fn open_file(&self, reopening_after_rotate: bool) -> std::io::Result<BufReader<File>> {
        let file = File::open(&self.path).await?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        if reopening_after_rotate {
            return Ok(reader);
        }

        match self.start_from {
            StartFrom::Beginning => {}
            StartFrom::End => {
                reader.seek(SeekFrom::End(0)).await?;
            }
            StartFrom::SkipLines(n) => {
                info!(path = %self.path.display(), skipped_lines = n, "skipping lines after open");
                let mut discard = String::new();
                for _ in 0..n {
                    discard.clear();
                    if reader.read_line(&mut discard).await? == 0 {
                        // 파일이 스킵 수보다 짧음
                        break;
                    }
                }
            }
        }

        Ok(reader)
    }

    /// 현재 핸들에 남은 라인을 전부 전송합니다.
    async fn drain_to_eof(&self, reader: &mut BufReader<File>, tx: &mpsc::Sender<String>) {
        debug!(path = %self.path.display(), "draining file to EOF before rotation switch");
        loop {
            match read_one_line(reader).await {
                Ok((line, at_eof)) => {
                    if let Some(line) = line {
                        if tx.send(line).await.is_err() {
                            return;
                        }
                    }
                    if at_eof {
                        return;
                    }
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "drain read error");
                    return;
                }
            }
        }
    }

    /// 로테이션 후 재열기를 최대 5회, 1초 간격으로 시도합니다.
    async fn reopen_after_rotation(&self) -> Option<BufReader<File>> {
        for attempt in 1..=REOPEN_ATTEMPTS {
            match self.open_file(true).await {
                Ok(reader) => return Some(reader),
                Err(e) => {
                    debug!(path = %self.path.display(), attempt, error = %e, "reopen attempt failed");
                    sleep(WAIT_INTERVAL).await;
                }
            }
        }
        None
    }
}

/// 한 줄을 읽습니다.
///
/// 반환값: (트림된 비어있지 않은 라인, EOF 도달 여부).
/// 개행 없이 끝나는 마지막 조각도 라인으로 전달됩니다.
async fn read_one_line(reader: &mut BufReader<File>) -> std::io::Result<(Option<String>, bool)> {
    let mut buf = String::new();
    let bytes_read = reader.read_line(&mut buf).await?;
    if bytes_read == 0 {
        return Ok((None, true));
    }
    let at_eof = !buf.ends_with('\n');
    let line = buf.trim();
    if line.is_empty() {
        Ok((None, at_eof))
    } else {
        Ok((Some(line.to_owned()), at_eof))
    }
}
