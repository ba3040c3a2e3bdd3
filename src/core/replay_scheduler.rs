use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufRead;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::concurrency_controller::ConcurrencyController;
use crate::core::line_source::LineSource;
use crate::core::request_builder::RequestBuilder;
use crate::core::result_sink::ResultSink;
use crate::core::transport::Transport;
use crate::models::error::ReplayError;
use crate::models::input_record::InputRecord;
use crate::models::request_descriptor::RequestDescriptor;

/// 单个输入文件的回放情况
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileReport {
    pub lines: u64,
    pub dispatched: u64,
    pub skipped: u64,
    pub pauses: u64,
}

/// 读完输入后等待在途请求的结果
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DrainReport {
    pub outstanding: usize,
    pub abandoned: usize,
}

/// 逐行读取、构建请求、异步发出；每发出N个请求暂停读取，D毫秒后恢复
pub struct ReplayScheduler {
    builder: Arc<dyn RequestBuilder>,
    transport: Arc<dyn Transport>,
    sink: Arc<ResultSink>,
    concurrency: i64,
    delay: Duration,
    limiter: Option<ConcurrencyController>,
    in_flight: JoinSet<()>,
}

impl ReplayScheduler {
    pub fn new(
        builder: Arc<dyn RequestBuilder>,
        transport: Arc<dyn Transport>,
        sink: Arc<ResultSink>,
        concurrency: i64,
        delay_ms: u64,
    ) -> Self {
        ReplayScheduler {
            builder,
            transport,
            sink,
            concurrency,
            delay: Duration::from_millis(delay_ms),
            limiter: None,
            in_flight: JoinSet::new(),
        }
    }

    /// 给在途请求加硬上限
    pub fn with_max_in_flight(mut self, cap: usize) -> Self {
        self.limiter = Some(ConcurrencyController::new(cap));
        self
    }

    /// 尚未结束的请求数
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub async fn run_file(&mut self, path: &Path) -> Result<FileReport, ReplayError> {
        let mut source = LineSource::open(path)
            .await
            .map_err(|source| ReplayError::FileRead {
                path: path.to_path_buf(),
                line: 0,
                source,
            })?;
        self.run(&mut source, path).await
    }

    pub async fn run<R: AsyncBufRead + Unpin>(
        &mut self,
        source: &mut LineSource<R>,
        origin: &Path,
    ) -> Result<FileReport, ReplayError> {
        let mut report = FileReport::default();
        let mut line_number = 0u64;

        loop {
            self.reap();
            // 输出文件写失败就不再继续
            self.sink.check_outputs()?;

            let line = match source.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    return Err(ReplayError::FileRead {
                        path: origin.to_path_buf(),
                        line: line_number,
                        source: e,
                    })
                }
            };
            line_number += 1;
            report.lines = line_number;

            let batch_end = self.concurrency > 0 && line_number % self.concurrency as u64 == 0;
            if batch_end {
                source.pause();
                report.pauses += 1;
            }

            match self.prepare(&line, line_number) {
                Ok(Some(request)) => {
                    let permit = match &self.limiter {
                        Some(limiter) => limiter.acquire().await,
                        None => None,
                    };
                    self.dispatch(request, permit);
                    report.dispatched += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    report.skipped += 1;
                    self.sink.on_rejected_line(&e)?;
                }
            }

            // 从第N个请求发出时开始计时，不等响应
            if batch_end {
                let handle = source.handle();
                let delay = self.delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    handle.resume();
                });
            }
        }

        info!(
            file = %origin.display(),
            lines = report.lines,
            dispatched = report.dispatched,
            skipped = report.skipped,
            "文件读取完成"
        );
        Ok(report)
    }

    /// 空行返回 `Ok(None)`
    fn prepare(
        &self,
        line: &str,
        line_number: u64,
    ) -> Result<Option<RequestDescriptor>, ReplayError> {
        if line.trim().is_empty() {
            debug!(line = line_number, "跳过空行");
            return Ok(None);
        }
        let record = InputRecord::parse(line).map_err(|source| ReplayError::InputParse {
            line: line_number,
            source,
        })?;
        self.builder
            .build(&record, line_number)
            .map(Some)
            .map_err(|e| ReplayError::Rejected {
                line: line_number,
                reason: format!("{:#}", e),
            })
    }

    fn dispatch(&mut self, request: RequestDescriptor, permit: Option<OwnedSemaphorePermit>) {
        let transport = self.transport.clone();
        let sink = self.sink.clone();
        sink.on_dispatch();
        self.in_flight.spawn(async move {
            let outcome = transport.send(request).await;
            drop(permit);
            // 写失败已经记在输出里，调度循环会读到
            if let Err(e) = sink.on_outcome(outcome) {
                error!("{}", e);
            }
        });
    }

    // 回收已经结束的任务，避免长时间回放时句柄堆积
    fn reap(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!("请求任务异常退出: {}", e);
                }
            }
        }
    }

    /// 等待在途请求，最多等 `grace`，超时的请求直接放弃
    pub async fn drain(&mut self, grace: Duration) -> DrainReport {
        self.reap();
        let outstanding = self.in_flight.len();
        let in_flight = &mut self.in_flight;
        let _ = tokio::time::timeout(grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        let abandoned = self.in_flight.len();
        if abandoned > 0 {
            warn!(abandoned, "等待超时，放弃未完成的请求");
        }
        self.in_flight.shutdown().await;
        DrainReport {
            outstanding,
            abandoned,
        }
    }
}
