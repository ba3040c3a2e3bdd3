use std::collections::BTreeMap;
use std::time::Instant;

use histogram::Histogram;
use parking_lot::Mutex;

use crate::models::http_error_stats::HttpErrorStats;
use crate::models::outcome::{FailureKind, RequestOutcome};
use crate::models::result::RunResult;

/// 整个回放期间的累计统计，不随统计周期清空
pub struct RunSummary {
    inner: Mutex<SummaryState>,
    start: Instant,
}

struct SummaryState {
    // 响应时间统计（毫秒）
    histogram: Histogram,
    dispatched: u64,
    completed: u64,
    successful: u64,
    parse_failures: u64,
    abandoned: u64,
    max_response_time: u64,
    min_response_time: u64,
    status_counts: BTreeMap<u16, u64>,
    http_errors: HttpErrorStats,
}

impl RunSummary {
    pub fn new() -> anyhow::Result<Self> {
        let histogram = Histogram::new(7, 32)
            .map_err(|e| anyhow::Error::msg(format!("创建histogram失败: {:?}", e)))?;
        Ok(RunSummary {
            inner: Mutex::new(SummaryState {
                histogram,
                dispatched: 0,
                completed: 0,
                successful: 0,
                parse_failures: 0,
                abandoned: 0,
                max_response_time: 0,
                min_response_time: u64::MAX,
                status_counts: BTreeMap::new(),
                http_errors: HttpErrorStats::new(),
            }),
            start: Instant::now(),
        })
    }

    pub fn record_dispatch(&self) {
        self.inner.lock().dispatched += 1;
    }

    pub fn record_parse_failure(&self) {
        self.inner.lock().parse_failures += 1;
    }

    pub fn record_abandoned(&self, count: u64) {
        self.inner.lock().abandoned += count;
    }

    pub fn record(&self, outcome: &RequestOutcome) {
        let mut state = self.inner.lock();
        if outcome.is_transport_error() {
            let kind = outcome.failure.unwrap_or(FailureKind::Other);
            state.http_errors.increment_transport(kind);
            return;
        }
        state.completed += 1;
        *state.status_counts.entry(outcome.status).or_insert(0) += 1;
        if outcome.is_success() {
            state.successful += 1;
        } else {
            state.http_errors.increment_status(outcome.status);
        }
        let duration = outcome.elapsed_ms.round() as u64;
        state.max_response_time = state.max_response_time.max(duration);
        state.min_response_time = state.min_response_time.min(duration);
        if let Err(e) = state.histogram.increment(duration) {
            tracing::warn!("histogram设置数据错误:{:?}", e);
        }
    }

    pub fn result(&self) -> RunResult {
        let state = self.inner.lock();
        let total_duration = self.start.elapsed().as_secs_f64();
        let percentile = |p: f64| match state.histogram.percentile(p) {
            Ok(bucket) => *bucket.range().start(),
            Err(_) => 0,
        };
        let err_count = state.http_errors.total();
        // 传输层错误没有状态码，但也算一次尝试
        let transport_errors: u64 = state
            .http_errors
            .errors
            .iter()
            .filter(|((code, _), _)| *code == 0)
            .map(|(_, count)| *count as u64)
            .sum();
        let attempted = state.completed + transport_errors;
        RunResult {
            total_duration,
            dispatched: state.dispatched,
            completed: state.completed,
            success_rate: if attempted > 0 {
                state.successful as f64 / attempted as f64 * 100.0
            } else {
                0.0
            },
            rps: if total_duration > 0.0 {
                state.completed as f64 / total_duration
            } else {
                0.0
            },
            median_response_time: percentile(50.0),
            response_time_95: percentile(95.0),
            response_time_99: percentile(99.0),
            max_response_time: state.max_response_time,
            min_response_time: if state.completed > 0 { state.min_response_time } else { 0 },
            err_count,
            parse_failures: state.parse_failures,
            abandoned: state.abandoned,
            status_counts: state.status_counts.clone(),
            http_errors: state.http_errors.errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request_descriptor::RequestDescriptor;
    use reqwest::header::HeaderMap;
    use reqwest::Method;

    fn descriptor(line: u64) -> RequestDescriptor {
        RequestDescriptor {
            uri: "https://h/a".into(),
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            tag: "replay".into(),
            line_number: line,
            path: "/a".into(),
        }
    }

    #[test]
    fn test_counts_and_errors() {
        let summary = RunSummary::new().unwrap();
        for _ in 0..4 {
            summary.record_dispatch();
        }
        summary.record_parse_failure();
        summary.record(&RequestOutcome::completed(&descriptor(1), 200, 10.0, None));
        summary.record(&RequestOutcome::completed(&descriptor(2), 200, 30.0, None));
        summary.record(&RequestOutcome::completed(&descriptor(3), 503, 5.0, None));
        summary.record(&RequestOutcome::failed(&descriptor(4), FailureKind::Timeout, "timed out"));
        summary.record_abandoned(2);

        let result = summary.result();
        assert_eq!(result.dispatched, 4);
        assert_eq!(result.completed, 3);
        assert_eq!(result.err_count, 2);
        assert_eq!(result.parse_failures, 1);
        assert_eq!(result.abandoned, 2);
        assert_eq!(result.max_response_time, 30);
        assert_eq!(result.min_response_time, 5);
        assert_eq!(result.status_counts.get(&200), Some(&2));
        assert_eq!(result.status_counts.get(&503), Some(&1));
        assert_eq!(result.success_rate, 50.0);
        assert_eq!(result.http_errors.get(&(0, "timeout")), Some(&1));
        assert_eq!(result.http_errors.get(&(503, "Service Unavailable")), Some(&1));
    }

    #[test]
    fn test_failures_on_distinct_paths_share_keys() {
        let summary = RunSummary::new().unwrap();
        for line in 1..=500u64 {
            let mut request = descriptor(line);
            request.path = format!("/item/{}", line);
            request.uri = format!("https://h/item/{}", line);
            summary.record(&RequestOutcome::completed(&request, 404, 1.0, None));
            summary.record(&RequestOutcome::failed(
                &request,
                FailureKind::Connect,
                format!("error sending request for url ({})", request.uri),
            ));
        }
        let result = summary.result();
        assert_eq!(result.http_errors.len(), 2);
        assert_eq!(result.http_errors.get(&(404, "Not Found")), Some(&500));
        assert_eq!(result.http_errors.get(&(0, "connect")), Some(&500));
        assert_eq!(result.err_count, 1000);
    }

    #[test]
    fn test_empty_summary() {
        let result = RunSummary::new().unwrap().result();
        assert_eq!(result.completed, 0);
        assert_eq!(result.median_response_time, 0);
        assert_eq!(result.min_response_time, 0);
        assert_eq!(result.success_rate, 0.0);
    }
}
