use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::core::output_logs::OutputLogs;
use crate::core::stat_accumulator::StatAccumulator;
use crate::models::error::ReplayError;
use crate::models::outcome::TimingPhases;
use crate::models::result::MetricRecord;

/// 统计维度，输出顺序固定为 `Dimension::ORDER`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// 传输层给出的总耗时
    All,
    Wait,
    Dns,
    Tcp,
    FirstByte,
    Download,
    /// 各阶段合计
    Total,
}

impl Dimension {
    pub const ORDER: [Dimension; 7] = [
        Dimension::All,
        Dimension::Wait,
        Dimension::Dns,
        Dimension::Tcp,
        Dimension::FirstByte,
        Dimension::Download,
        Dimension::Total,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::All => "tall",
            Dimension::Wait => "twait",
            Dimension::Dns => "tdns",
            Dimension::Tcp => "ttcp",
            Dimension::FirstByte => "t1stb",
            Dimension::Download => "tstdl",
            Dimension::Total => "ttot",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// 一次请求各阶段耗时对应的样本
pub fn phase_samples(phases: &TimingPhases) -> [(Dimension, f64); 6] {
    [
        (Dimension::Wait, phases.wait),
        (Dimension::Dns, phases.dns),
        (Dimension::Tcp, phases.tcp),
        (Dimension::FirstByte, phases.first_byte),
        (Dimension::Download, phases.download),
        (Dimension::Total, phases.total),
    ]
}

struct WindowState {
    elapsed_seconds: f64,
    last_tick: Instant,
    accumulators: [StatAccumulator; 7],
}

// 结束时不满周期的窗口，速率的分母至少按1毫秒算
const MIN_PARTIAL_SECS: f64 = 0.001;

/// 按固定周期汇总并清空的一组统计器
pub struct MetricWindow {
    inner: Mutex<WindowState>,
    tick_interval: Duration,
}

impl MetricWindow {
    pub fn new(tick_interval: Duration) -> Self {
        MetricWindow {
            inner: Mutex::new(WindowState {
                elapsed_seconds: 0.0,
                last_tick: Instant::now(),
                accumulators: Default::default(),
            }),
            tick_interval,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// 同一个请求的样本在一次加锁里写入，保证落在同一个窗口
    pub fn record(&self, samples: &[(Dimension, f64)]) {
        let mut state = self.inner.lock();
        for (dimension, value) in samples {
            state.accumulators[dimension.index()].push(*value);
        }
    }

    /// 当前窗口里某个维度已有的样本数
    pub fn pending(&self, dimension: Dimension) -> usize {
        self.inner.lock().accumulators[dimension.index()].count()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.inner.lock().elapsed_seconds
    }

    /// 汇总并清空所有维度，没有样本的维度也输出一行
    pub fn tick(&self) -> Vec<MetricRecord> {
        let period_secs = self.tick_interval.as_secs_f64();
        let mut state = self.inner.lock();
        summarise(&mut state, period_secs)
    }

    /// 回放结束时输出最后一个不满周期的窗口。
    ///
    /// `elapsed_seconds` 只前进实际经过的时间，`rate` 也按这段时间计算。
    /// 窗口里没有任何样本时不输出。
    pub fn flush_partial(&self) -> Vec<MetricRecord> {
        let mut state = self.inner.lock();
        if state.accumulators.iter().all(StatAccumulator::is_empty) {
            return Vec::new();
        }
        let partial = state
            .last_tick
            .elapsed()
            .as_secs_f64()
            .min(self.tick_interval.as_secs_f64());
        let partial_secs = ((partial * 1000.0).round() / 1000.0).max(MIN_PARTIAL_SECS);
        summarise(&mut state, partial_secs)
    }
}

fn summarise(state: &mut WindowState, period_secs: f64) -> Vec<MetricRecord> {
    state.elapsed_seconds += period_secs;
    state.last_tick = Instant::now();
    let elapsed_seconds = state.elapsed_seconds;

    Dimension::ORDER
        .iter()
        .map(|dimension| {
            let acc = &mut state.accumulators[dimension.index()];
            let summary = acc.summary();
            let rate = acc.rate(period_secs);
            acc.reset();
            let (min, max) = summary.range.unwrap_or((0.0, 0.0));
            MetricRecord {
                elapsed_seconds,
                dimension: dimension.name(),
                count: summary.count,
                rate,
                p50: summary.p50.unwrap_or(0.0),
                p75: summary.p75.unwrap_or(0.0),
                p95: summary.p95.unwrap_or(0.0),
                min,
                max,
            }
        })
        .collect()
}

/// 每个周期把窗口统计写进tsv，写失败时返回
pub async fn emit_periodically(
    window: Arc<MetricWindow>,
    logs: Arc<OutputLogs>,
) -> Result<(), ReplayError> {
    let period = window.tick_interval();
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let records = window.tick();
        for record in &records {
            logs.write_metric(record)?;
        }
        debug!(
            elapsed = window.elapsed_seconds(),
            requests = records.first().map(|r| r.count).unwrap_or(0),
            "统计周期已输出"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output_logs::OutputPaths;
    use time::OffsetDateTime;

    #[test]
    fn test_empty_tick_emits_every_dimension() {
        let window = MetricWindow::new(Duration::from_millis(5000));
        let records = window.tick();
        let names: Vec<&str> = records.iter().map(|r| r.dimension).collect();
        assert_eq!(names, vec!["tall", "twait", "tdns", "ttcp", "t1stb", "tstdl", "ttot"]);
        for record in &records {
            assert_eq!(record.elapsed_seconds, 5.0);
            assert_eq!(record.count, 0);
            assert_eq!(record.rate, 0.0);
            assert_eq!(record.p50, 0.0);
            assert_eq!(record.max, 0.0);
        }
        let again = window.tick();
        assert_eq!(again[0].elapsed_seconds, 10.0);
    }

    #[test]
    fn test_tick_summarises_and_resets() {
        let window = MetricWindow::new(Duration::from_millis(5000));
        for v in [10.0, 20.0, 30.0, 40.0] {
            window.record(&[(Dimension::All, v)]);
        }
        window.record(&phase_samples(&TimingPhases {
            wait: 1.0,
            dns: 2.0,
            tcp: 3.0,
            first_byte: 4.0,
            download: 5.0,
            total: 15.0,
        }));
        assert_eq!(window.pending(Dimension::All), 4);
        assert_eq!(window.pending(Dimension::Dns), 1);

        let records = window.tick();
        let all = &records[0];
        assert_eq!(all.count, 4);
        assert_eq!(all.rate, 0.8);
        assert_eq!(all.p50, 20.0);
        assert_eq!(all.p75, 30.0);
        assert_eq!(all.p95, 40.0);
        assert_eq!((all.min, all.max), (10.0, 40.0));
        assert_eq!(records[6].dimension, "ttot");
        assert_eq!(records[6].p50, 15.0);

        assert_eq!(window.pending(Dimension::All), 0);
        assert_eq!(window.tick()[0].count, 0);
    }

    #[test]
    fn test_tsv_line_format() {
        let window = MetricWindow::new(Duration::from_millis(5000));
        window.record(&[(Dimension::All, 12.34), (Dimension::All, 56.78)]);
        let line = window.tick()[0].to_tsv_line();
        assert_eq!(line, "5\ttall\t2\t0.4\t12.3\t56.8\t56.8\t12.3\t56.8");
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_on_fixed_clock() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::for_run(dir.path(), 1, 0, OffsetDateTime::now_utc());
        let logs = Arc::new(OutputLogs::open(paths.clone()).unwrap());
        let window = Arc::new(MetricWindow::new(Duration::from_millis(5000)));
        window.record(&[(Dimension::All, 7.0)]);

        let emitter = tokio::spawn(emit_periodically(window.clone(), logs.clone()));
        tokio::time::sleep(Duration::from_millis(10_100)).await;
        emitter.abort();

        let tsv = std::fs::read_to_string(&paths.metrics).unwrap();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), 14);
        assert!(lines[0].starts_with("5\ttall\t1\t"));
        assert!(lines[7].starts_with("10\ttall\t0\t"));
        assert_eq!(window.elapsed_seconds(), 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_window_rate_uses_elapsed_time() {
        let window = MetricWindow::new(Duration::from_millis(5000));
        assert!(window.flush_partial().is_empty());

        window.record(&[(Dimension::All, 3.0), (Dimension::Total, 3.0)]);
        window.record(&[(Dimension::All, 9.0)]);
        tokio::time::advance(Duration::from_millis(500)).await;

        let records = window.flush_partial();
        assert_eq!(records.len(), 7);
        assert_eq!(records[0].elapsed_seconds, 0.5);
        assert_eq!(records[0].count, 2);
        assert_eq!(records[0].rate, 4.0);
        assert_eq!((records[0].min, records[0].max), (3.0, 9.0));
        assert_eq!(records[6].count, 1);
        assert_eq!(window.pending(Dimension::All), 0);
        assert!(window.flush_partial().is_empty());
    }
}
