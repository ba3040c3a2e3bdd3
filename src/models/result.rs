use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::models::outcome::RequestOutcome;

/// 一个统计窗口里某个维度的汇总，对应tsv里的一行
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub elapsed_seconds: f64,
    pub dimension: &'static str,
    pub count: usize,
    pub rate: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricRecord {
    pub fn to_tsv_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{:.1}\t{:.1}\t{:.1}\t{:.1}\t{:.1}",
            self.elapsed_seconds,
            self.dimension,
            self.count,
            self.rate,
            self.p50,
            self.p75,
            self.p95,
            self.min,
            self.max
        )
    }
}

/// 结果日志(ldjson)里的一行
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord {
    pub ts: String,
    pub status: u16,
    pub time: f64,
    pub method: String,
    pub path: String,
    pub line: u64,
    pub tag: String,
}

impl ResultRecord {
    pub fn from_outcome(outcome: &RequestOutcome, ts: String) -> Self {
        ResultRecord {
            ts,
            status: outcome.status,
            time: outcome.elapsed_ms,
            method: outcome.method.clone(),
            path: outcome.path.clone(),
            line: outcome.line_number,
            tag: outcome.tag.clone(),
        }
    }
}

/// 整个回放结束后的汇总
#[derive(Debug, Clone)]
pub struct RunResult {
    pub total_duration: f64,
    pub dispatched: u64,
    pub completed: u64,
    pub success_rate: f64,
    pub rps: f64,
    pub median_response_time: u64,
    pub response_time_95: u64,
    pub response_time_99: u64,
    pub max_response_time: u64,
    pub min_response_time: u64,
    pub err_count: u64,
    pub parse_failures: u64,
    pub abandoned: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub http_errors: HashMap<(u16, &'static str), u32>,
}
