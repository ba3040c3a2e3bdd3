use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::Context;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::time::Instant;

use crate::models::outcome::{FailureKind, RequestOutcome, TimingPhases};
use crate::models::request_descriptor::RequestDescriptor;

/// 发出请求并给出结果，错误放在 `RequestOutcome::error` 里，不会向上抛
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    fn send(&self, request: RequestDescriptor) -> BoxFuture<'_, RequestOutcome>;
}

fn failure_kind(e: &reqwest::Error) -> FailureKind {
    if e.is_timeout() {
        FailureKind::Timeout
    } else if e.is_connect() {
        FailureKind::Connect
    } else if e.is_body() || e.is_decode() {
        FailureKind::Body
    } else {
        FailureKind::Other
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// user_agent: 包名 版本 (系统; 系统版本)
pub fn user_agent() -> String {
    let info = os_info::get();
    format!(
        "{} {} ({}; {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        info.os_type(),
        info.version()
    )
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client_builder = Client::builder().user_agent(user_agent());
        // 如果传入了超时时间，客户端添加超时时间
        let client = if timeout_secs > 0 {
            client_builder
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .context("构建带超时的http客户端失败")?
        } else {
            client_builder.build().context("构建http客户端失败")?
        };
        Ok(ReqwestTransport { client })
    }
}

impl Transport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn send(&self, mut request: RequestDescriptor) -> BoxFuture<'_, RequestOutcome> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method.clone(), &request.uri)
                .headers(std::mem::take(&mut request.headers));
            if let Some(body) = request.body.take() {
                builder = builder.body(body);
            }
            // 记录开始时间
            let start = Instant::now();
            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    return RequestOutcome::failed(&request, failure_kind(&e), e.to_string())
                }
            };
            let status = response.status().as_u16();
            // reqwest 不暴露连接阶段，首字节时间按拿到响应头计算
            let first_byte = millis(start.elapsed());
            let download_start = Instant::now();
            if let Err(e) = response.bytes().await {
                return RequestOutcome::failed(
                    &request,
                    failure_kind(&e),
                    format!("读取响应体失败: {}", e),
                );
            }
            let download = millis(download_start.elapsed());
            let phases = TimingPhases {
                first_byte,
                download,
                total: first_byte + download,
                ..TimingPhases::default()
            };
            RequestOutcome::completed(&request, status, millis(start.elapsed()), Some(phases))
        })
    }
}

/// 模拟传输层：不发网络请求，按配置的延迟返回结果
pub struct MockTransport {
    latency: Duration,
    status: u16,
    line_latency: HashMap<u64, Duration>,
    failing: HashSet<u64>,
    dispatched: Mutex<Vec<(u64, Instant)>>,
}

impl MockTransport {
    pub fn new(latency_ms: u64) -> Self {
        MockTransport {
            latency: Duration::from_millis(latency_ms),
            status: 200,
            line_latency: HashMap::new(),
            failing: HashSet::new(),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// 单独指定某一行的延迟
    pub fn with_line_latency(mut self, line: u64, latency_ms: u64) -> Self {
        self.line_latency.insert(line, Duration::from_millis(latency_ms));
        self
    }

    /// 指定某一行返回传输层错误
    pub fn failing_on(mut self, line: u64) -> Self {
        self.failing.insert(line);
        self
    }

    /// 已发出的 (行号, 发出时间)
    pub fn dispatched(&self) -> Vec<(u64, Instant)> {
        self.dispatched.lock().clone()
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn send(&self, request: RequestDescriptor) -> BoxFuture<'_, RequestOutcome> {
        self.dispatched.lock().push((request.line_number, Instant::now()));
        let latency = self
            .line_latency
            .get(&request.line_number)
            .copied()
            .unwrap_or(self.latency);
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if self.failing.contains(&request.line_number) {
                return RequestOutcome::failed(&request, FailureKind::Connect, "connection refused");
            }
            let elapsed = millis(latency);
            let phases = TimingPhases {
                first_byte: elapsed,
                total: elapsed,
                ..TimingPhases::default()
            };
            RequestOutcome::completed(&request, self.status, elapsed, Some(phases))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use reqwest::Method;

    fn descriptor(line: u64) -> RequestDescriptor {
        RequestDescriptor {
            uri: "http://127.0.0.1:9/a".into(),
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            tag: "replay".into(),
            line_number: line,
            path: "/a".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_transport() {
        let transport = MockTransport::new(20).with_line_latency(2, 5).failing_on(3);
        let ok = transport.send(descriptor(1)).await;
        assert_eq!(ok.status, 200);
        assert_eq!(ok.elapsed_ms, 20.0);
        assert_eq!(ok.phases.map(|p| p.total), Some(20.0));
        assert_eq!(ok.line_number, 1);

        let fast = transport.send(descriptor(2)).await;
        assert_eq!(fast.elapsed_ms, 5.0);

        let failed = transport.send(descriptor(3)).await;
        assert!(failed.is_transport_error());
        assert_eq!(failed.status, 0);
        assert_eq!(transport.dispatched().len(), 3);
    }

    #[test]
    fn test_user_agent() {
        assert!(user_agent().starts_with("playback-engine "));
    }

    #[tokio::test]
    async fn test_connection_error_is_reported_in_outcome() {
        let transport = ReqwestTransport::new(2).unwrap();
        // 端口9 (discard) 本地一般没有监听
        let outcome = transport.send(descriptor(7)).await;
        assert_eq!(outcome.status, 0);
        assert!(outcome.is_transport_error());
        assert_eq!(outcome.line_number, 7);
        assert!(outcome.phases.is_none());
    }
}
