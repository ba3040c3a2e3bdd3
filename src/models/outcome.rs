use serde::Serialize;
use time::OffsetDateTime;

use crate::models::request_descriptor::RequestDescriptor;

/// 单次请求各阶段耗时（毫秒）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingPhases {
    pub wait: f64,
    pub dns: f64,
    pub tcp: f64,
    pub first_byte: f64,
    pub download: f64,
    pub total: f64,
}

/// 传输层失败的类别，汇总时只按类别计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    Connect,
    Body,
    Other,
}

impl FailureKind {
    pub fn name(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Connect => "connect",
            FailureKind::Body => "body",
            FailureKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestOutcome {
    // 传输层失败时为0
    pub status: u16,
    pub elapsed_ms: f64,
    pub phases: Option<TimingPhases>,
    pub line_number: u64,
    pub completed_at: OffsetDateTime,
    pub tag: String,
    pub method: String,
    pub path: String,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
}

impl RequestOutcome {
    pub fn completed(
        request: &RequestDescriptor,
        status: u16,
        elapsed_ms: f64,
        phases: Option<TimingPhases>,
    ) -> Self {
        RequestOutcome {
            status,
            elapsed_ms,
            phases,
            line_number: request.line_number,
            completed_at: OffsetDateTime::now_utc(),
            tag: request.tag.clone(),
            method: request.method.to_string(),
            path: request.path.clone(),
            failure: None,
            error: None,
        }
    }

    pub fn failed(
        request: &RequestDescriptor,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        RequestOutcome {
            status: 0,
            elapsed_ms: 0.0,
            phases: None,
            line_number: request.line_number,
            completed_at: OffsetDateTime::now_utc(),
            tag: request.tag.clone(),
            method: request.method.to_string(),
            path: request.path.clone(),
            failure: Some(kind),
            error: Some(message.into()),
        }
    }

    pub fn is_transport_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_success(&self) -> bool {
        !self.is_transport_error() && (200..400).contains(&self.status)
    }
}
