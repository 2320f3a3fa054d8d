use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use tailpost_core::config::MonitoredFileConfig;
use tailpost_db::{AnalyticsSink, MySqlSink};
use tailpost_metrics::os_metrics;
use tailpost_pipeline::{FilePipeline, COUNTER_HANDLER_NAME, METRIC_GENERATOR_HANDLER_NAME};

mod cli;
mod config_loader;
mod logging;

use cli::{Cli, PROFILE_COUNT, PROFILE_METRICS};
use config_loader::LoadedConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 설정 에러는 모두 exit code 1
    if let Err(message) = cli.validate_profile() {
        eprintln!("{message}");
        std::process::exit(1);
    }

    let loaded = match build_config(&cli) {
        Ok(loaded) => loaded,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&cli.log_level);

    run(loaded).await;
}

/// CLI 플래그 또는 설정 파일에서 실행 설정을 조립합니다.
fn build_config(cli: &Cli) -> Result<LoadedConfig, String> {
    if let Some(config_path) = &cli.config {
        return config_loader::load_config_file(config_path)
            .map_err(|e| format!("Invalid configuration: {e}"));
    }

    let Some(file_path) = &cli.file_path else {
        return Err(
            "Invalid options, cannot continue, missing log file path. Either a configuration \
             file or command line parameters are required. Use -h to view command line options."
                .to_owned(),
        );
    };

    // 프로파일별 기본 핸들러
    let handler_name = if !cli.handler.is_empty() {
        cli.handler.clone()
    } else if cli.profile == PROFILE_COUNT {
        COUNTER_HANDLER_NAME.to_owned()
    } else if cli.profile == PROFILE_METRICS {
        METRIC_GENERATOR_HANDLER_NAME.to_owned()
    } else {
        String::new()
    };

    let mut config = MonitoredFileConfig {
        file_path: file_path.clone(),
        handlers: if handler_name.is_empty() {
            Vec::new()
        } else {
            vec![handler_name]
        },
        follow: cli.follow,
        start_from: cli.start_from,
        time_window_size_minutes: cli.window_minutes,
        domain_name: cli.domain.clone(),
        write_to_file_target_file: cli.write_target.clone(),
        counter_top_n: cli.counter_top_n,
        counter_output_interval_seconds: cli.counter_interval_seconds,
        ..Default::default()
    };
    config.normalize();

    let mut loaded = LoadedConfig::default();
    loaded.files.insert(file_path.clone(), config);
    Ok(loaded)
}

async fn run(loaded: LoadedConfig) {
    info!("starting tailpost with configuration:");
    for (path, config) in &loaded.files {
        info!(file = %path, configuration = ?config, "monitored file");
    }

    // 싱크는 (주소, DB, 사용자)별로 하나만 만들어 파이프라인들이 공유
    let mut sinks = SinkCache::default();

    let mut pipelines = JoinSet::new();
    for (path, config) in loaded.files {
        if !config.enabled {
            info!(file = %path, "entry disabled, skipping");
            continue;
        }
        let sink = if config.needs_db() {
            sinks.get_or_connect(&config).await
        } else {
            None
        };
        pipelines.spawn(async move {
            let result = FilePipeline::new(config, sink).run().await;
            (path, result)
        });
    }

    // OS 메트릭 수집 태스크
    let os_task = match &loaded.os_metrics {
        Some(entry) if entry.os_metrics_enabled => {
            match sinks.get_or_connect(entry).await {
                Some(sink) => Some(spawn_os_metrics_task(
                    sink,
                    entry.os_metrics_interval_minutes,
                    entry.host_id,
                )),
                None => {
                    warn!("OS metrics enabled but no usable database configuration, skipping");
                    None
                }
            }
        }
        _ => None,
    };

    while let Some(joined) = pipelines.join_next().await {
        match joined {
            Ok((path, Ok(stats))) => {
                info!(
                    file = %path,
                    processed = stats.processed_lines,
                    errors = stats.error_lines,
                    "pipeline finished"
                );
            }
            Ok((path, Err(e))) => {
                error!(file = %path, error = %e, "pipeline failed");
            }
            Err(e) => {
                error!(error = %e, "pipeline task panicked");
            }
        }
    }

    if let Some(task) = os_task {
        task.abort();
    }
    info!("tailpost shut down");
}

/// 주기적으로 OS 메트릭을 수집해 싱크에 저장하는 태스크를 띄웁니다.
///
/// 다음 실행 시각은 현재 시각에 간격을 더해 정해집니다. 분 산술로
/// 달력을 재구성하지 않으므로 분=60 같은 값이 나올 일이 없습니다.
fn spawn_os_metrics_task(
    sink: Arc<dyn AnalyticsSink>,
    interval_minutes: u32,
    host_id: i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(u64::from(interval_minutes) * 60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            // interval의 첫 틱은 즉시 발화하므로 시작 직후 1회 수집됨
            ticker.tick().await;

            let uptime = match os_metrics::collect_uptime().await {
                Ok(Some(uptime)) => uptime,
                Ok(None) => {
                    warn!("unexpected uptime output format, skipping sample");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "failed to run uptime, skipping sample");
                    continue;
                }
            };
            let memory = match os_metrics::collect_memory().await {
                Ok(memory) => memory,
                Err(e) => {
                    warn!(error = %e, "failed to run free -L, continuing without memory info");
                    None
                }
            };

            if let Err(e) = sink.save_os_metrics(&uptime, memory.as_ref(), host_id).await {
                error!(error = %e, "failed to save OS metrics");
            }
        }
    })
}

/// (주소, DB, 사용자)별 싱크 캐시
#[derive(Default)]
struct SinkCache {
    sinks: HashMap<(String, String, String), Arc<dyn AnalyticsSink>>,
}

impl SinkCache {
    /// 설정에 맞는 싱크를 반환하거나 새로 연결합니다.
    ///
    /// 연결 실패는 치명적이지 않습니다: 해당 파이프라인은 저장 없이
    /// 계속 동작합니다.
    async fn get_or_connect(&mut self, config: &MonitoredFileConfig) -> Option<Arc<dyn AnalyticsSink>> {
        if config.db_address.is_empty() || config.db_database.is_empty() {
            return None;
        }
        let key = (
            config.db_address.clone(),
            config.db_database.clone(),
            config.db_user.clone(),
        );
        if let Some(sink) = self.sinks.get(&key) {
            return Some(Arc::clone(sink));
        }
        match MySqlSink::connect(
            &config.db_user,
            &config.db_password,
            &config.db_address,
            &config.db_database,
        )
        .await
        {
            Ok(sink) => {
                let sink: Arc<dyn AnalyticsSink> = Arc::new(sink);
                self.sinks.insert(key, Arc::clone(&sink));
                Some(sink)
            }
            Err(e) => {
                error!(address = %config.db_address, database = %config.db_database, error = %e,
                    "failed to connect to database, continuing without persistence");
                None
            }
        }
    }
}
