//! 카운터 핸들러 — 현재/이전 값 추적과 주기적 콘솔 출력
//!
//! 윈도우 집계기와 독립적인 인메모리 뷰입니다. 스칼라 6종과 키드 맵 9종을
//! 유지하며, follow 모드에서는 티커가 `output_interval_seconds`마다
//! 스냅샷을 출력하고 윈도우를 굴립니다 (`previous ← current`).
//!
//! 출력 직전에 Clients / Referers / RequestedPaths 맵은 `current` 기준
//! top-N으로 압축됩니다. 동점은 키의 사전순으로 깨서 결과가 재현 가능하게
//! 합니다.
//!
//! 라인 소비자와 티커 두 군데서만 상태를 만지므로 뮤텍스 하나로
//! 직렬화합니다. 임계 구역이 짧아 RwLock은 이득이 없습니다.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::debug;

use tailpost_core::types::{Human, Malicious, RequestRecord};

/// 현재/이전 카운터 쌍
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterValue {
    pub current: i64,
    pub previous: i64,
}

impl CounterValue {
    /// 현재 값을 증가시킵니다.
    fn increment(&mut self, delta: i64) {
        self.current += delta;
    }

    /// 윈도우를 굴립니다: 이전 값이 현재 값으로 덮입니다.
    fn roll(&mut self) {
        self.previous = self.current;
    }

    /// 이번 윈도우의 증가량
    fn delta(&self) -> i64 {
        self.current - self.previous
    }
}

/// 카운터 상태 전체 (뮤텍스 아래)
#[derive(Debug, Default)]
pub struct CounterState {
    pub total_lines: CounterValue,
    pub total_requests: CounterValue,
    pub total_bytes: CounterValue,
    pub human_requests: CounterValue,
    pub non_human_requests: CounterValue,
    pub malicious_requests: CounterValue,

    pub status_codes: HashMap<String, CounterValue>,
    pub methods: HashMap<String, CounterValue>,
    pub clients: HashMap<String, CounterValue>,
    pub ua_families: HashMap<String, CounterValue>,
    pub ua_os_families: HashMap<String, CounterValue>,
    pub device_types: HashMap<String, CounterValue>,
    pub referers: HashMap<String, CounterValue>,
    pub requested_paths: HashMap<String, CounterValue>,
    pub intents: HashMap<String, CounterValue>,
}

impl CounterState {
    fn roll_windows(&mut self) {
        self.total_lines.roll();
        self.total_requests.roll();
        self.total_bytes.roll();
        self.human_requests.roll();
        self.non_human_requests.roll();
        self.malicious_requests.roll();

        for map in [
            &mut self.status_codes,
            &mut self.methods,
            &mut self.clients,
            &mut self.ua_families,
            &mut self.ua_os_families,
            &mut self.device_types,
            &mut self.referers,
            &mut self.requested_paths,
            &mut self.intents,
        ] {
            for value in map.values_mut() {
                value.roll();
            }
        }
    }
}

fn bump(map: &mut HashMap<String, CounterValue>, key: &str) {
    map.entry(key.to_owned()).or_default().increment(1);
}

/// 맵을 `current` 기준 top-N으로 압축합니다.
///
/// 유지된 엔트리는 `previous`를 보존합니다. 동점은 키 사전순(오름차순)으로
/// 깨서 호출마다 같은 결과가 나옵니다.
pub fn shrink_to_top_n(map: &mut HashMap<String, CounterValue>, top_n: usize) {
    if map.len() <= top_n {
        return;
    }
    let mut entries: Vec<(String, CounterValue)> = map.drain().collect();
    entries.sort_by(|a, b| b.1.current.cmp(&a.1.current).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(top_n);
    map.extend(entries);
}

/// 카운터 핸들러
pub struct CounterHandler {
    state: Arc<Mutex<CounterState>>,
    is_following: bool,
    top_n: usize,
    ticker_task: Option<tokio::task::JoinHandle<()>>,
}

impl CounterHandler {
    /// 핸들러를 생성하고, follow 모드면 출력 티커를 시작합니다.
    ///
    /// follow가 아니면 티커는 돌지 않고 `end`에서 한 번만 출력합니다.
    pub fn begin(following: bool, output_interval_seconds: u64, top_n: usize) -> Self {
        let state = Arc::new(Mutex::new(CounterState::default()));
        let mut handler = Self {
            state: Arc::clone(&state),
            is_following: following,
            top_n,
            ticker_task: None,
        };

        if following {
            debug!(output_interval_seconds, "counter handler starting output ticker");
            let ticker_state = state;
            let task = tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(output_interval_seconds));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // 첫 틱은 즉시 발화하므로 건너뜀
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let mut state = ticker_state.lock().await;
                    print!("{}", render_snapshot(&mut state, true, top_n));
                    state.roll_windows();
                }
            });
            handler.ticker_task = Some(task);
        } else {
            debug!("counter handler in one-shot mode, no ticker");
        }

        handler
    }

    /// 레코드 하나를 집계합니다.
    pub async fn handle(&mut self, record: &RequestRecord) {
        let mut state = self.state.lock().await;

        state.total_lines.increment(1);
        state.total_requests.increment(1);
        state.total_bytes.increment(record.bytes_sent as i64);
        if record.user_agent.human == Human::Human {
            state.human_requests.increment(1);
        }
        if record.user_agent.human == Human::NotHuman {
            state.non_human_requests.increment(1);
        }
        if record.malicious != Malicious::None {
            state.malicious_requests.increment(1);
        }

        bump(&mut state.status_codes, &record.status);
        bump(&mut state.methods, &record.method);
        bump(&mut state.clients, &record.client_ip);
        bump(&mut state.ua_families, record.user_agent.family.as_tag());
        bump(&mut state.ua_os_families, record.user_agent.os.as_tag());
        bump(&mut state.device_types, record.user_agent.device_type.as_tag());
        bump(&mut state.referers, &record.referer);
        bump(&mut state.requested_paths, &record.path);
        bump(&mut state.intents, record.user_agent.intent.as_tag());
    }

    /// 스트림 종료: 티커를 멈추고 마지막 스냅샷을 출력합니다.
    pub async fn end(&mut self) {
        if let Some(task) = self.ticker_task.take() {
            task.abort();
            let _ = task.await;
        }
        let mut state = self.state.lock().await;
        print!("{}", render_snapshot(&mut state, self.is_following, self.top_n));
    }

    /// 현재 상태 스냅샷 (테스트용)
    pub async fn state_snapshot(&self) -> CounterState {
        let state = self.state.lock().await;
        CounterState {
            total_lines: state.total_lines,
            total_requests: state.total_requests,
            total_bytes: state.total_bytes,
            human_requests: state.human_requests,
            non_human_requests: state.non_human_requests,
            malicious_requests: state.malicious_requests,
            status_codes: state.status_codes.clone(),
            methods: state.methods.clone(),
            clients: state.clients.clone(),
            ua_families: state.ua_families.clone(),
            ua_os_families: state.ua_os_families.clone(),
            device_types: state.device_types.clone(),
            referers: state.referers.clone(),
            requested_paths: state.requested_paths.clone(),
            intents: state.intents.clone(),
        }
    }

    /// 수동 윈도우 굴림 (테스트용)
    pub async fn roll_windows(&self) {
        self.state.lock().await.roll_windows();
    }
}

/// 스냅샷 텍스트를 생성합니다.
///
/// 출력 직전에 Clients / Referers / RequestedPaths를 top-N으로 압축하므로
/// `state`를 가변으로 받습니다.
pub fn render_snapshot(state: &mut CounterState, following: bool, top_n: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "---------{}---------",
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    );

    render_scalar(&mut out, "Total log lines   :", state.total_lines, following);
    render_scalar(&mut out, "Total requests    :", state.total_requests, following);
    render_scalar(&mut out, "Total bytes sent  :", state.total_bytes, following);
    render_scalar(&mut out, "Requests by humans:", state.human_requests, following);
    render_scalar(&mut out, "Non-human requests:", state.non_human_requests, following);
    render_scalar(&mut out, "Malicious requests:", state.malicious_requests, following);

    render_map(&mut out, "Intents           :", &state.intents, following);
    render_map(&mut out, "Status codes      :", &state.status_codes, following);
    render_map(&mut out, "Methods           :", &state.methods, following);
    render_map(&mut out, "User agents       :", &state.ua_families, following);
    render_map(&mut out, "Operating systems :", &state.ua_os_families, following);

    shrink_to_top_n(&mut state.clients, top_n);
    render_map(&mut out, "Clients           :", &state.clients, following);

    shrink_to_top_n(&mut state.referers, top_n);
    render_map(&mut out, "Referers          :", &state.referers, following);

    shrink_to_top_n(&mut state.requested_paths, top_n);
    render_map(&mut out, "Requested Path    :", &state.requested_paths, following);

    out.push('\n');
    out
}

fn render_scalar(out: &mut String, header: &str, value: CounterValue, following: bool) {
    if following {
        let _ = writeln!(out, "{header} {} ({:+})", value.current, value.delta());
    } else {
        let _ = writeln!(out, "{header} {}", value.current);
    }
}

fn render_map(
    out: &mut String,
    header: &str,
    map: &HashMap<String, CounterValue>,
    following: bool,
) {
    let mut entries: Vec<(&String, &CounterValue)> = map.iter().collect();
    // current 내림차순, 동점은 키 사전순
    entries.sort_by(|a, b| b.1.current.cmp(&a.1.current).then_with(|| a.0.cmp(b.0)));

    let mut label_width = 10usize;
    for (key, _) in &entries {
        label_width = label_width.max(key.len());
    }
    label_width = label_width.min(15);

    let indent = " ".repeat(header.len());
    let mut prefix = header;
    for (key, value) in entries {
        let shown_key: &str = if key.is_empty() { "-not set-" } else { key };
        if following {
            let _ = writeln!(
                out,
                "{prefix} {shown_key:<width$}:{:>6} ({:+})",
                value.current,
                value.delta(),
                width = label_width + 1,
            );
        } else {
            let _ = writeln!(
                out,
                "{prefix} {shown_key:<width$}:{:>6}",
                value.current,
                width = label_width + 1,
            );
        }
        prefix = &indent;
    }
}
