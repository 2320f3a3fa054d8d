//! 윈도우 메트릭 집계기
//!
//! (파일 경로, 메트릭 타입, 키)마다 최근 W개의 시간 윈도우 버킷을 유지합니다.
//! 새 윈도우가 등장해 윈도우가 가득 차면 가장 오래된 버킷이 퇴출되어
//! [`EvictedBucket`]으로 방출되고, 호출자가 이를 저장 채널로 보냅니다.
//!
//! # 불변식
//! - 시리즈당 버킷 수는 항상 W 이하이며 키 뷰는 오름차순 정렬 상태
//! - 퇴출된 버킷의 윈도우는 새로 삽입된 윈도우보다 항상 과거
//! - 가장 오래된 보유 버킷보다 과거인 윈도우는 조용히 드롭됨
//! - 모든 버킷은 `add`의 자연 퇴출 또는 `flush` 중 정확히 한 번만 방출됨
//!
//! 로그가 대체로 시간순이라는 가정 위에 동작합니다. 처리 시간이 긴 요청이
//! 늦게 기록되는 정도의 순서 뒤틀림은 W개의 버킷 여유로 흡수됩니다.

use std::collections::BTreeMap;

use tracing::debug;

/// 윈도우에서 퇴출된 버킷 — 싱크로 전달되어 저장됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedBucket {
    /// 원본 로그 파일 경로
    pub file_path: String,
    /// 메트릭 타입 태그 ([`crate::metric_type`] 참조)
    pub metric_type: i32,
    /// 키 값. 키 없는 메트릭(총 요청 수 등)은 빈 문자열
    pub key_value: String,
    /// 스냅된 시간 윈도우 (`YYYYMMDDhhmm`)
    pub time_window: i64,
    /// 버킷에 누적된 값
    pub value: i64,
}

/// 키 하나의 버킷 시리즈
///
/// `BTreeMap`이 정렬된 키 뷰를 겸하므로 가장 오래된 버킷은 첫 엔트리입니다.
#[derive(Debug, Default)]
struct MetricSeries {
    buckets: BTreeMap<i64, i64>,
    /// 지금까지 삽입된 신규 윈도우 수. W 이상이면 윈도우가 가득 찬 상태
    fill_count: usize,
}

/// 파일 하나의 집계 상태
#[derive(Debug, Default)]
struct FileMetrics {
    /// metric_type → key_value → 시리즈
    series: BTreeMap<i32, BTreeMap<String, MetricSeries>>,
    /// 최근 관측된 서로 다른 윈도우 id (정렬, 용량 W+1)
    active_windows: Vec<i64>,
}

/// 윈도우 메트릭 집계기
///
/// 파이프라인마다 하나씩 소유되며 잠금이 필요 없습니다 (단일 소비자).
pub struct MetricsAggregator {
    files: BTreeMap<String, FileMetrics>,
    window_size: usize,
}

impl MetricsAggregator {
    /// 윈도우 크기 W로 집계기를 생성합니다.
    ///
    /// W는 설정 단계에서 [2,10]으로 클램프되어 들어옵니다.
    pub fn new(window_size: usize) -> Self {
        Self {
            files: BTreeMap::new(),
            window_size,
        }
    }

    /// 설정된 윈도우 크기 W를 반환합니다.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// 메트릭 값을 더합니다.
    ///
    /// - 이미 있는 윈도우면 값을 증가시키고 `None`
    /// - 새 윈도우이고 자리가 남아 있으면 삽입하고 `None`
    /// - 가득 찬 상태에서 가장 오래된 보유 윈도우보다 과거면 상태를 바꾸지
    ///   않고 `None` (늦게 도착한 옛 데이터는 드롭)
    /// - 가득 찬 상태에서 더 새로운 윈도우면 가장 오래된 버킷을 퇴출하고
    ///   `Some(EvictedBucket)` 반환
    ///
    /// delta 0은 항상 no-op입니다. 음수 delta는 계약상 허용되지 않습니다.
    pub fn add(
        &mut self,
        file_path: &str,
        metric_type: i32,
        key_value: &str,
        time_window: i64,
        delta: i64,
    ) -> Option<EvictedBucket> {
        if delta == 0 {
            return None;
        }

        let file = self.files.entry(file_path.to_owned()).or_default();
        Self::track_window(&mut file.active_windows, self.window_size, time_window);

        let series = file
            .series
            .entry(metric_type)
            .or_default()
            .entry(key_value.to_owned())
            .or_default();

        if let Some(value) = series.buckets.get_mut(&time_window) {
            *value += delta;
            return None;
        }

        if series.fill_count >= self.window_size {
            // 가득 참. 가장 오래된 보유 윈도우와 비교
            if let Some(oldest) = series.buckets.keys().next().copied() {
                if time_window < oldest {
                    debug!(
                        metric_type,
                        time_window, oldest, "stale window past retention, dropping"
                    );
                    return None;
                }
                let evicted_value = series.buckets.remove(&oldest).unwrap_or(0);
                series.buckets.insert(time_window, delta);
                series.fill_count += 1;
                return Some(EvictedBucket {
                    file_path: file_path.to_owned(),
                    metric_type,
                    key_value: key_value.to_owned(),
                    time_window: oldest,
                    value: evicted_value,
                });
            }
        }

        series.buckets.insert(time_window, delta);
        series.fill_count += 1;
        None
    }

    /// 파일의 active_windows 목록을 갱신합니다.
    ///
    /// 이미 있는 윈도우는 무시. 새 윈도우는 삽입 후 정렬하며,
    /// 길이가 W+1에 도달하면 가장 오래된 것을 버립니다.
    fn track_window(active: &mut Vec<i64>, window_size: usize, time_window: i64) {
        if active.contains(&time_window) {
            return;
        }
        active.push(time_window);
        active.sort_unstable();
        if active.len() >= window_size + 1 {
            active.remove(0);
        }
    }

    /// 현재 추적 중인 윈도우 목록 (테스트/상태 확인용)
    pub fn active_windows(&self, file_path: &str) -> &[i64] {
        self.files
            .get(file_path)
            .map(|f| f.active_windows.as_slice())
            .unwrap_or(&[])
    }

    /// 한 시리즈가 보유한 윈도우 id 목록 (오름차순)
    pub fn series_windows(&self, file_path: &str, metric_type: i32, key_value: &str) -> Vec<i64> {
        self.files
            .get(file_path)
            .and_then(|f| f.series.get(&metric_type))
            .and_then(|keys| keys.get(key_value))
            .map(|s| s.buckets.keys().copied().collect())
            .unwrap_or_default()
    }

    /// 한 버킷의 현재 값
    pub fn bucket_value(
        &self,
        file_path: &str,
        metric_type: i32,
        key_value: &str,
        time_window: i64,
    ) -> Option<i64> {
        self.files
            .get(file_path)?
            .series
            .get(&metric_type)?
            .get(key_value)?
            .buckets
            .get(&time_window)
            .copied()
    }

    /// 어떤 버킷도 active_windows에 남아 있지 않은 키를 통째로 제거합니다.
    ///
    /// 클라이언트 IP처럼 카디널리티가 높은 메트릭의 메모리를 제한할 때
    /// 명시적으로 호출합니다. 기본 메트릭 셋에서는 호출되지 않습니다.
    pub fn cleanup_all_keys(&mut self, file_path: &str, metric_type: i32) {
        let Some(file) = self.files.get_mut(file_path) else {
            return;
        };
        let active = file.active_windows.clone();
        if let Some(keys) = file.series.get_mut(&metric_type) {
            keys.retain(|key, series| {
                let keep = series.buckets.keys().any(|w| active.contains(w));
                if !keep {
                    debug!(metric_type, key, "removing key with no active windows");
                }
                keep
            });
        }
    }

    /// 파일의 남은 버킷 전부를 방출하고 상태를 비웁니다.
    ///
    /// EOF 시점에 파이프라인이 호출합니다. 이미 퇴출된 버킷은 시리즈에
    /// 남아 있지 않으므로 이중 방출은 발생하지 않습니다.
    pub fn flush(&mut self, file_path: &str) -> Vec<EvictedBucket> {
        let Some(file) = self.files.remove(file_path) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (metric_type, keys) in file.series {
            for (key_value, series) in keys {
                for (time_window, value) in series.buckets {
                    out.push(EvictedBucket {
                        file_path: file_path.to_owned(),
                        metric_type,
                        key_value: key_value.clone(),
                        time_window,
                        value,
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric_type;

    const FILE: &str = "/var/log/access.log";

    #[test]
    fn first_bucket_returns_none() {
        let mut agg = MetricsAggregator::new(3);
        let evicted = agg.add(FILE, metric_type::REQUEST_COUNT, "", 202501011200, 1);
        assert!(evicted.is_none());
        assert_eq!(
            agg.bucket_value(FILE, metric_type::REQUEST_COUNT, "", 202501011200),
            Some(1)
        );
    }

    #[test]
    fn same_window_accumulates() {
        let mut agg = MetricsAggregator::new(3);
        agg.add(FILE, metric_type::BYTES_SENT, "", 202501011200, 100);
        agg.add(FILE, metric_type::BYTES_SENT, "", 202501011200, 50);
        assert_eq!(
            agg.bucket_value(FILE, metric_type::BYTES_SENT, "", 202501011200),
            Some(150)
        );
    }

    #[test]
    fn eviction_after_window_fills() {
        // W=3에서 4번째 윈도우 삽입 시 가장 오래된 버킷 퇴출
        let mut agg = MetricsAggregator::new(3);
        assert!(agg
            .add(FILE, metric_type::REQUEST_COUNT, "", 202501011200, 1)
            .is_none());
        assert!(agg
            .add(FILE, metric_type::REQUEST_COUNT, "", 202501011201, 1)
            .is_none());
        assert!(agg
            .add(FILE, metric_type::REQUEST_COUNT, "", 202501011202, 1)
            .is_none());

        let evicted = agg
            .add(FILE, metric_type::REQUEST_COUNT, "", 202501011203, 1)
            .unwrap();
        assert_eq!(evicted.time_window, 202501011200);
        assert_eq!(evicted.value, 1);
        assert_eq!(evicted.metric_type, metric_type::REQUEST_COUNT);
        assert_eq!(evicted.key_value, "");

        assert_eq!(
            agg.series_windows(FILE, metric_type::REQUEST_COUNT, ""),
            vec![202501011201, 202501011202, 202501011203]
        );
    }

    #[test]
    fn late_window_is_dropped_without_state_change() {
        let mut agg = MetricsAggregator::new(3);
        for window in [202501011201, 202501011202, 202501011203] {
            agg.add(FILE, metric_type::REQUEST_COUNT, "", window, 1);
        }
        // 가득 찬 뒤 퇴출 한 번
        agg.add(FILE, metric_type::REQUEST_COUNT, "", 202501011204, 1)
            .unwrap();

        // 보유 범위보다 과거인 윈도우는 거부됨
        let evicted = agg.add(FILE, metric_type::REQUEST_COUNT, "", 202501011200, 5);
        assert!(evicted.is_none());
        assert_eq!(
            agg.series_windows(FILE, metric_type::REQUEST_COUNT, ""),
            vec![202501011202, 202501011203, 202501011204]
        );
        assert_eq!(
            agg.bucket_value(FILE, metric_type::REQUEST_COUNT, "", 202501011200),
            None
        );
    }

    #[test]
    fn zero_delta_is_noop() {
        let mut agg = MetricsAggregator::new(3);
        let evicted = agg.add(FILE, metric_type::REQUEST_COUNT, "", 202501011200, 0);
        assert!(evicted.is_none());
        assert_eq!(
            agg.series_windows(FILE, metric_type::REQUEST_COUNT, ""),
            Vec::<i64>::new()
        );
    }

    #[test]
    fn bucket_bound_holds_per_series() {
        let mut agg = MetricsAggregator::new(4);
        for window in 0..20 {
            agg.add(FILE, metric_type::HTTP_STATUS, "200", 202501011200 + window, 1);
            assert!(agg.series_windows(FILE, metric_type::HTTP_STATUS, "200").len() <= 4);
        }
    }

    #[test]
    fn evictions_are_monotonic() {
        let mut agg = MetricsAggregator::new(2);
        let mut evicted_windows = Vec::new();
        for window in [10, 11, 12, 13, 14, 15] {
            if let Some(evicted) = agg.add(FILE, metric_type::METHOD, "GET", 202501011200 + window, 1)
            {
                evicted_windows.push(evicted.time_window);
            }
        }
        for pair in evicted_windows.windows(2) {
            assert!(pair[0] < pair[1], "evictions must be strictly increasing");
        }
    }

    #[test]
    fn separate_keys_have_separate_windows() {
        let mut agg = MetricsAggregator::new(2);
        agg.add(FILE, metric_type::HTTP_STATUS, "200", 202501011200, 1);
        agg.add(FILE, metric_type::HTTP_STATUS, "404", 202501011202, 1);
        assert_eq!(
            agg.series_windows(FILE, metric_type::HTTP_STATUS, "200"),
            vec![202501011200]
        );
        assert_eq!(
            agg.series_windows(FILE, metric_type::HTTP_STATUS, "404"),
            vec![202501011202]
        );
    }

    #[test]
    fn separate_files_do_not_share_state() {
        let mut agg = MetricsAggregator::new(2);
        agg.add("/a.log", metric_type::REQUEST_COUNT, "", 202501011200, 1);
        agg.add("/b.log", metric_type::REQUEST_COUNT, "", 202501011201, 7);
        assert_eq!(
            agg.bucket_value("/a.log", metric_type::REQUEST_COUNT, "", 202501011200),
            Some(1)
        );
        assert_eq!(
            agg.bucket_value("/b.log", metric_type::REQUEST_COUNT, "", 202501011201),
            Some(7)
        );
        assert_eq!(
            agg.bucket_value("/a.log", metric_type::REQUEST_COUNT, "", 202501011201),
            None
        );
    }

    #[test]
    fn flush_emits_every_remaining_bucket_once() {
        let mut agg = MetricsAggregator::new(3);
        agg.add(FILE, metric_type::REQUEST_COUNT, "", 202501011200, 2);
        agg.add(FILE, metric_type::REQUEST_COUNT, "", 202501011201, 3);
        agg.add(FILE, metric_type::HTTP_STATUS, "200", 202501011200, 4);

        let mut flushed = agg.flush(FILE);
        flushed.sort_by_key(|b| (b.metric_type, b.time_window));
        assert_eq!(flushed.len(), 3);
        assert_eq!(flushed[0].metric_type, metric_type::REQUEST_COUNT);
        assert_eq!(flushed[0].time_window, 202501011200);
        assert_eq!(flushed[0].value, 2);
        assert_eq!(flushed[2].metric_type, metric_type::HTTP_STATUS);
        assert_eq!(flushed[2].value, 4);

        // 두 번째 flush는 아무것도 방출하지 않음
        assert!(agg.flush(FILE).is_empty());
    }

    #[test]
    fn eviction_exclusivity_across_add_and_flush() {
        // 삽입된 모든 버킷은 add 또는 flush에서 정확히 한 번 방출됨
        let mut agg = MetricsAggregator::new(3);
        let windows = [202501011200, 202501011201, 202501011202, 202501011203, 202501011204];
        let mut emitted = Vec::new();
        for window in windows {
            if let Some(evicted) = agg.add(FILE, metric_type::REQUEST_COUNT, "", window, 1) {
                emitted.push(evicted.time_window);
            }
        }
        emitted.extend(agg.flush(FILE).into_iter().map(|b| b.time_window));
        emitted.sort_unstable();
        assert_eq!(emitted, windows.to_vec());
    }

    #[test]
    fn active_windows_tracks_recent_distinct_windows() {
        let mut agg = MetricsAggregator::new(3);
        for window in [202501011200, 202501011201, 202501011202, 202501011203] {
            agg.add(FILE, metric_type::REQUEST_COUNT, "", window, 1);
        }
        let active = agg.active_windows(FILE);
        assert!(active.len() <= 3);
        assert!(active.contains(&202501011203));
        assert!(!active.contains(&202501011200));
        // 정렬 상태 확인
        let mut sorted = active.to_vec();
        sorted.sort_unstable();
        assert_eq!(active, sorted.as_slice());
    }

    #[test]
    fn cleanup_removes_keys_outside_active_windows() {
        let mut agg = MetricsAggregator::new(2);
        // IP 하나가 오래된 윈도우에만 등장
        agg.add(FILE, metric_type::CLIENT_IP, "10.0.0.1", 202501011200, 1);
        // 다른 트래픽이 윈도우를 밀어냄
        for window in [202501011205, 202501011206, 202501011207] {
            agg.add(FILE, metric_type::CLIENT_IP, "10.0.0.2", window, 1);
        }

        agg.cleanup_all_keys(FILE, metric_type::CLIENT_IP);
        assert!(agg
            .series_windows(FILE, metric_type::CLIENT_IP, "10.0.0.1")
            .is_empty());
        assert!(!agg
            .series_windows(FILE, metric_type::CLIENT_IP, "10.0.0.2")
            .is_empty());
    }

    #[test]
    fn eviction_precedes_inserted_window() {
        let mut agg = MetricsAggregator::new(2);
        agg.add(FILE, metric_type::REQUEST_COUNT, "", 202501011200, 1);
        agg.add(FILE, metric_type::REQUEST_COUNT, "", 202501011210, 1);
        let evicted = agg
            .add(FILE, metric_type::REQUEST_COUNT, "", 202501011220, 1)
            .unwrap();
        assert!(evicted.time_window < 202501011220);
    }
}
