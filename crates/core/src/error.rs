//! 에러 타입 — 도메인별 에러 정의

/// Tailpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TailpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 로그 라인 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 저장소(DB) 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 시작 시점에 발생하면 프로세스 전체가 종료됩니다 (exit code 1).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
///
/// 파일 하나의 파이프라인만 종료시키며 다른 파이프라인에는 영향이 없습니다.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파일 열기 실패
    #[error("failed to open '{path}': {reason}")]
    Open { path: String, reason: String },

    /// 로테이션 후 재열기 실패 (5회 시도 소진)
    #[error("could not reopen '{path}' after rotation")]
    ReopenExhausted { path: String },

    /// 디렉토리 watcher 에러
    #[error("watcher error for '{path}': {reason}")]
    Watcher { path: String, reason: String },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

/// 로그 라인 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 등록된 어떤 형식과도 일치하지 않는 라인
    #[error("invalid log format")]
    InvalidLogFormat,

    /// 타임스탬프 파싱 실패
    #[error("invalid timestamp: '{value}'")]
    InvalidTimestamp { value: String },
}

/// 저장소(DB) 에러
///
/// 영향받은 레코드/버킷은 드롭됩니다. 재시도 큐는 없습니다.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),
}
