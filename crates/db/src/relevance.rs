//! 관련성 필터 — raw 로그 저장 대상 선별
//!
//! `SaveLogsToDbOnlyRelevant=1`일 때 봇/스캐너 트래픽과 리다이렉트,
//! 404 같은 노이즈를 저장하지 않기 위한 조건입니다.

use tailpost_core::types::{DeviceType, Malicious, RequestRecord, UaFamily};

/// 레코드가 raw 로그로 저장할 가치가 있는지 판정합니다.
///
/// 조건 (모두 만족해야 저장):
/// - 악성 표시가 없음
/// - 상태 코드가 2xx 또는 5xx
/// - 디바이스 유형이 Script가 아님
/// - UA 계열이 Scanner / SEOBot / Script가 아님
pub fn is_relevant_for_raw_log(record: &RequestRecord) -> bool {
    record.malicious == Malicious::None
        && (record.status.starts_with('2') || record.status.starts_with('5'))
        && record.user_agent.device_type != DeviceType::Script
        && !matches!(
            record.user_agent.family,
            UaFamily::Scanner | UaFamily::SeoBot | UaFamily::Script
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailpost_core::types::Human;

    fn human_ok_record() -> RequestRecord {
        let mut record = RequestRecord::new();
        record.status = "200".to_owned();
        record.user_agent.device_type = DeviceType::Desktop;
        record.user_agent.family = UaFamily::Chrome;
        record.user_agent.human = Human::Unknown;
        record
    }

    #[test]
    fn normal_browser_request_is_relevant() {
        assert!(is_relevant_for_raw_log(&human_ok_record()));
    }

    #[test]
    fn server_error_is_relevant() {
        let mut record = human_ok_record();
        record.status = "503".to_owned();
        assert!(is_relevant_for_raw_log(&record));
    }

    #[test]
    fn redirect_and_client_error_are_not_relevant() {
        let mut record = human_ok_record();
        record.status = "301".to_owned();
        assert!(!is_relevant_for_raw_log(&record));
        record.status = "404".to_owned();
        assert!(!is_relevant_for_raw_log(&record));
    }

    #[test]
    fn malicious_request_is_not_relevant() {
        let mut record = human_ok_record();
        record.malicious = Malicious::Traversal;
        assert!(!is_relevant_for_raw_log(&record));
    }

    #[test]
    fn script_device_is_not_relevant() {
        let mut record = human_ok_record();
        record.user_agent.device_type = DeviceType::Script;
        assert!(!is_relevant_for_raw_log(&record));
    }

    #[test]
    fn scanner_seo_script_families_are_not_relevant() {
        for family in [UaFamily::Scanner, UaFamily::SeoBot, UaFamily::Script] {
            let mut record = human_ok_record();
            record.user_agent.family = family;
            assert!(!is_relevant_for_raw_log(&record), "{family:?}");
        }
    }

    #[test]
    fn search_and_social_bots_remain_relevant() {
        // 검색/소셜 봇은 필터에서 제외하지 않음
        for family in [UaFamily::SearchBot, UaFamily::SocialBot] {
            let mut record = human_ok_record();
            record.user_agent.family = family;
            assert!(is_relevant_for_raw_log(&record), "{family:?}");
        }
    }
}
