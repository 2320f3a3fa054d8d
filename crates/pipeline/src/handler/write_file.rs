//! 파일 재기록 핸들러 — 정규화된 레코드를 JSON 라인으로 출력
//!
//! 파싱된 레코드를 한 줄에 하나씩 JSON으로 직렬화하여 대상 파일에
//! 덧붙입니다. 여러 형식의 로그를 단일 형식으로 합칠 때 사용합니다.

use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info};

use tailpost_core::error::{ConfigError, TailpostError};
use tailpost_core::types::RequestRecord;

/// 파일 재기록 핸들러
pub struct WriteToFileHandler {
    target_path: String,
    writer: BufWriter<tokio::fs::File>,
}

impl WriteToFileHandler {
    /// 대상 파일을 열어 핸들러를 생성합니다 (append, 없으면 생성).
    ///
    /// 대상 경로가 비어 있으면 설정 에러입니다.
    pub async fn begin(target_path: &str) -> Result<Self, TailpostError> {
        if target_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "WriteToFileTargetFile".to_owned(),
                reason: "required when the WRITE_TO_FILE handler is enabled".to_owned(),
            }
            .into());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(target_path)
            .await
            .map_err(|e| {
                error!(target_path, error = %e, "failed to open target file for writing");
                TailpostError::Io(e)
            })?;

        info!(target_path, "write-to-file handler opened target");
        Ok(Self {
            target_path: target_path.to_owned(),
            writer: BufWriter::new(file),
        })
    }

    /// 레코드를 JSON 한 줄로 기록합니다.
    pub async fn handle(&mut self, record: &RequestRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to serialize record");
                return;
            }
        };
        if let Err(e) = self.writer.write_all(line.as_bytes()).await {
            error!(target = %self.target_path, error = %e, "write failed");
            return;
        }
        if let Err(e) = self.writer.write_all(b"\n").await {
            error!(target = %self.target_path, error = %e, "write failed");
        }
    }

    /// 버퍼를 플러시하고 종료합니다.
    pub async fn end(&mut self) {
        if let Err(e) = self.writer.flush().await {
            error!(target = %self.target_path, error = %e, "flush failed");
        }
    }
}
