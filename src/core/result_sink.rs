use std::sync::Arc;

use tracing::warn;

use crate::core::metric_window::{phase_samples, Dimension, MetricWindow};
use crate::core::output_logs::{iso_timestamp, OutputLogs};
use crate::core::run_summary::RunSummary;
use crate::models::error::ReplayError;
use crate::models::outcome::RequestOutcome;
use crate::models::result::ResultRecord;

/// 接收每个请求的结果：进统计窗口、写结果日志、定期写进度
pub struct ResultSink {
    window: Arc<MetricWindow>,
    logs: Arc<OutputLogs>,
    summary: Arc<RunSummary>,
    progress_every: u64,
}

impl ResultSink {
    pub fn new(
        window: Arc<MetricWindow>,
        logs: Arc<OutputLogs>,
        summary: Arc<RunSummary>,
        progress_every: u64,
    ) -> Self {
        ResultSink {
            window,
            logs,
            summary,
            progress_every: progress_every.max(1),
        }
    }

    pub fn window(&self) -> &MetricWindow {
        &self.window
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn on_outcome(&self, outcome: RequestOutcome) -> Result<(), ReplayError> {
        self.summary.record(&outcome);

        // 传输层错误：只记运行日志，不产生耗时样本
        if let Some(message) = &outcome.error {
            let err = ReplayError::Transport {
                line: outcome.line_number,
                message: message.clone(),
            };
            warn!("{}", err);
            return self.logs.write_operational(&err.to_string());
        }

        let mut samples = Vec::with_capacity(Dimension::ORDER.len());
        if outcome.elapsed_ms > 0.0 {
            samples.push((Dimension::All, outcome.elapsed_ms));
        }
        if let Some(phases) = &outcome.phases {
            samples.extend(phase_samples(phases));
        }
        self.window.record(&samples);

        let ts = iso_timestamp(outcome.completed_at);
        self.logs.write_result(&ResultRecord::from_outcome(&outcome, ts))?;

        if outcome.line_number % self.progress_every == 0 && outcome.status != 0 {
            self.logs
                .write_operational(&format!("{} {}", outcome.status, outcome.line_number))?;
        }
        Ok(())
    }

    pub fn on_dispatch(&self) {
        self.summary.record_dispatch();
    }

    /// 记录无法解析或无法构建请求的行，回放继续
    pub fn on_rejected_line(&self, reason: &ReplayError) -> Result<(), ReplayError> {
        self.summary.record_parse_failure();
        warn!("跳过无效行: {}", reason);
        self.logs.write_operational(&reason.to_string())
    }

    pub fn check_outputs(&self) -> Result<(), ReplayError> {
        self.logs.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output_logs::OutputPaths;
    use crate::models::outcome::{FailureKind, TimingPhases};
    use crate::models::request_descriptor::RequestDescriptor;
    use reqwest::header::HeaderMap;
    use reqwest::Method;
    use std::time::Duration;
    use time::OffsetDateTime;

    struct Fixture {
        _dir: tempfile::TempDir,
        paths: OutputPaths,
        sink: ResultSink,
    }

    fn fixture(progress_every: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::for_run(dir.path(), 5, 0, OffsetDateTime::now_utc());
        let logs = Arc::new(OutputLogs::open(paths.clone()).unwrap());
        let sink = ResultSink::new(
            Arc::new(MetricWindow::new(Duration::from_secs(5))),
            logs,
            Arc::new(RunSummary::new().unwrap()),
            progress_every,
        );
        Fixture {
            _dir: dir,
            paths,
            sink,
        }
    }

    fn descriptor(line: u64) -> RequestDescriptor {
        RequestDescriptor {
            uri: "https://h/items".into(),
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            tag: "replay".into(),
            line_number: line,
            path: "/items".into(),
        }
    }

    #[test]
    fn test_outcome_with_phases() {
        let f = fixture(100);
        let phases = TimingPhases {
            first_byte: 8.0,
            download: 2.0,
            total: 10.0,
            ..TimingPhases::default()
        };
        f.sink
            .on_outcome(RequestOutcome::completed(&descriptor(1), 200, 11.0, Some(phases)))
            .unwrap();

        assert_eq!(f.sink.window().pending(Dimension::All), 1);
        assert_eq!(f.sink.window().pending(Dimension::FirstByte), 1);
        assert_eq!(f.sink.window().pending(Dimension::Total), 1);

        let results = std::fs::read_to_string(&f.paths.results).unwrap();
        let value: serde_json::Value = serde_json::from_str(results.trim()).unwrap();
        assert_eq!(value["status"], 200);
        assert_eq!(value["time"], 11.0);
        assert_eq!(value["method"], "GET");
        assert_eq!(value["path"], "/items");
        assert_eq!(value["line"], 1);
    }

    #[test]
    fn test_outcome_without_phases_still_logged() {
        let f = fixture(100);
        f.sink
            .on_outcome(RequestOutcome::completed(&descriptor(2), 404, 3.0, None))
            .unwrap();
        assert_eq!(f.sink.window().pending(Dimension::All), 1);
        assert_eq!(f.sink.window().pending(Dimension::Total), 0);
        let results = std::fs::read_to_string(&f.paths.results).unwrap();
        assert_eq!(results.lines().count(), 1);
    }

    #[test]
    fn test_transport_error_is_isolated() {
        let f = fixture(100);
        let result = f
            .sink
            .on_outcome(RequestOutcome::failed(
                &descriptor(42),
                FailureKind::Connect,
                "connection refused",
            ));
        assert!(result.is_ok());
        assert_eq!(f.sink.window().pending(Dimension::All), 0);
        assert_eq!(std::fs::read_to_string(&f.paths.results).unwrap(), "");
        let log = std::fs::read_to_string(&f.paths.operational).unwrap();
        assert!(log.contains("line 42: request error: connection refused"));
        assert_eq!(f.sink.summary().result().err_count, 1);
    }

    #[test]
    fn test_progress_line_every_n() {
        let f = fixture(2);
        for line in 1..=4 {
            f.sink
                .on_outcome(RequestOutcome::completed(&descriptor(line), 200, 1.0, None))
                .unwrap();
        }
        let log = std::fs::read_to_string(&f.paths.operational).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": 200 2"));
        assert!(lines[1].ends_with(": 200 4"));
    }

    #[test]
    fn test_rejected_line() {
        let f = fixture(100);
        f.sink
            .on_rejected_line(&ReplayError::Rejected {
                line: 7,
                reason: "无效的方法: 'G ET'".into(),
            })
            .unwrap();
        let log = std::fs::read_to_string(&f.paths.operational).unwrap();
        assert!(log.contains("line 7: skipped: 无效的方法: 'G ET'"));
        assert_eq!(f.sink.summary().result().parse_failures, 1);
    }
}
