use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::ProgressBar;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::core::metric_window::{emit_periodically, MetricWindow};
use crate::core::output_logs::{OutputLogs, OutputPaths};
use crate::core::parse_headers::parse_headers;
use crate::core::replay_scheduler::ReplayScheduler;
use crate::core::request_builder::{ReplayBuilder, RequestBuilder, SearchBuilder};
use crate::core::result_sink::ResultSink;
use crate::core::run_summary::RunSummary;
use crate::core::transport::{MockTransport, ReqwestTransport, Transport};
use crate::models::replay_config::{Mode, ReplayConfig};
use crate::models::result::RunResult;

// 模拟传输层的固定延迟
const DRY_RUN_LATENCY_MS: u64 = 5;

/// 按配置打开输出文件、构建请求方式和传输层，然后回放
pub async fn run(config: ReplayConfig) -> anyhow::Result<RunResult> {
    config.validate()?;
    let paths = OutputPaths::for_run(
        &config.output_dir,
        config.concurrency,
        config.delay_ms,
        OffsetDateTime::now_utc(),
    );
    // 输出文件打不开直接退出
    let logs = Arc::new(OutputLogs::open(paths)?);
    let builder = request_builder(&config)?;
    let transport: Arc<dyn Transport> = if config.dry_run {
        Arc::new(MockTransport::new(DRY_RUN_LATENCY_MS))
    } else {
        Arc::new(ReqwestTransport::new(config.timeout_secs)?)
    };
    run_with(config, logs, builder, transport).await
}

pub fn request_builder(config: &ReplayConfig) -> anyhow::Result<Arc<dyn RequestBuilder>> {
    let headers = parse_headers(&config.headers).context("解析请求头失败")?;
    Ok(match config.mode {
        Mode::Replay => Arc::new(ReplayBuilder::new(
            config.scheme.clone(),
            config.target_host.clone(),
            headers,
        )),
        Mode::Search => Arc::new(SearchBuilder::new(
            config.scheme.clone(),
            config.target_host.clone(),
            config.search_endpoint.clone(),
            config.refinement_path.clone(),
            headers,
        )?),
    })
}

pub async fn run_with(
    config: ReplayConfig,
    logs: Arc<OutputLogs>,
    builder: Arc<dyn RequestBuilder>,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<RunResult> {
    info!(
        concurrency = config.concurrency,
        delay_ms = config.delay_ms,
        host = %config.target_host,
        builder = builder.name(),
        transport = transport.name(),
        "开始回放"
    );
    info!("结果输出到 {}", logs.paths().results.display());

    let window = Arc::new(MetricWindow::new(config.tick_interval()));
    let summary = Arc::new(RunSummary::new()?);
    let sink = Arc::new(ResultSink::new(
        window.clone(),
        logs.clone(),
        summary.clone(),
        config.progress_log_every,
    ));
    // 统计周期独立于读取节奏
    let emitter = tokio::spawn(emit_periodically(window.clone(), logs.clone()));

    let mut scheduler = ReplayScheduler::new(
        builder,
        transport,
        sink,
        config.concurrency,
        config.delay_ms,
    );
    if let Some(cap) = config.max_in_flight {
        scheduler = scheduler.with_max_in_flight(cap);
    }

    for path in &config.input_paths {
        match scheduler.run_file(path).await {
            Ok(report) => {
                logs.write_operational(&format!(
                    "Read entire file {} ({} lines, {} dispatched, {} skipped).",
                    path.display(),
                    report.lines,
                    report.dispatched,
                    report.skipped
                ))?;
            }
            Err(e) if e.is_file_local() => {
                // 这个文件到此为止，后面的文件继续
                error!("{}", e);
                logs.write_operational(&e.to_string())?;
            }
            Err(e) => {
                emitter.abort();
                scheduler.drain(Duration::ZERO).await;
                return Err(e.into());
            }
        }
    }

    // 给在途请求一段时间完成
    let bar = if config.show_progress {
        let bar = ProgressBar::new_spinner();
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("等待所有请求响应");
        Some(bar)
    } else {
        None
    };
    let drain = scheduler.drain(config.drain_grace()).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    summary.record_abandoned(drain.abandoned as u64);
    if drain.abandoned > 0 {
        logs.write_operational(&format!(
            "{} requests still pending after {} ms, abandoned",
            drain.abandoned, config.drain_grace_ms
        ))?;
    }

    // 先停掉定时输出，再把最后不满一个周期的样本写进tsv
    emitter.abort();
    if let Ok(Err(e)) = emitter.await {
        error!("{}", e);
    }
    for record in window.flush_partial() {
        logs.write_metric(&record)?;
    }
    logs.write_operational("Exiting")?;
    logs.flush()?;
    logs.check()?;
    Ok(summary.result())
}
