//! 형식 자동 감지 — 첫 라인으로 파서를 결정하고 고정합니다.
//!
//! 등록된 형식을 고정된 순서로 시도하여 첫 번째로 성공한 파서에
//! lock-in 합니다. 이후 라인은 고정된 파서로만 파싱하며,
//! 실패해도 파서를 풀지 않습니다 (에러로 집계만 됩니다).

use tracing::debug;

use tailpost_core::error::ParseError;
use tailpost_core::types::RequestRecord;

use crate::formats::{
    parse_apache_combined, parse_apache_common, parse_apache_vhost_combined, parse_nginx_combined,
    parse_nginx_custom, ParserFn,
};

/// 시도 순서대로 나열된 지원 형식 목록
pub const FORMATS: [(&str, ParserFn); 5] = [
    ("Apache Common Log Format", parse_apache_common),
    ("Apache Combined Log Format", parse_apache_combined),
    ("Apache VHost Combined Log Format", parse_apache_vhost_combined),
    ("Nginx Combined Log Format", parse_nginx_combined),
    ("Nginx Custom Log Format", parse_nginx_custom),
];

/// 파일 하나의 형식 감지 상태
///
/// 파이프라인마다 하나씩 생성됩니다.
pub struct FormatDetector {
    locked: Option<(&'static str, ParserFn)>,
}

impl FormatDetector {
    /// 아직 형식이 정해지지 않은 감지기를 생성합니다.
    pub fn new() -> Self {
        Self { locked: None }
    }

    /// 라인 하나를 파싱합니다.
    ///
    /// 아직 형식이 정해지지 않았으면 등록된 형식을 순서대로 시도하고,
    /// 첫 번째 성공에서 lock-in 합니다. 이때 파싱된 첫 라인도
    /// 정상적으로 반환되어 핸들러에 전달됩니다.
    pub fn parse_line(&mut self, line: &str) -> Result<RequestRecord, ParseError> {
        if let Some((_, parser)) = self.locked {
            return parser(line);
        }

        for (name, parser) in FORMATS {
            if let Ok(record) = parser(line) {
                debug!(format = name, "format detected, locking parser for this file");
                self.locked = Some((name, parser));
                return Ok(record);
            }
        }
        Err(ParseError::InvalidLogFormat)
    }

    /// lock-in 된 형식 이름을 반환합니다. 아직 미정이면 `None`.
    pub fn locked_format(&self) -> Option<&'static str> {
        self.locked.map(|(name, _)| name)
    }
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self::new()
    }
}
