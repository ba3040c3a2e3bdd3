use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::models::error::ReplayError;
use crate::models::result::{MetricRecord, ResultRecord};

/// 三个输出文件的路径
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub results: PathBuf,
    pub operational: PathBuf,
    pub metrics: PathBuf,
}

impl OutputPaths {
    /// playback_{n}_{d}_{MMDD_HHmmss}.{ldjson,log,tsv}
    pub fn for_run(dir: &Path, concurrency: i64, delay_ms: u64, started: OffsetDateTime) -> Self {
        let stem = format!("playback_{}_{}_{}", concurrency, delay_ms, file_stamp(started));
        OutputPaths {
            results: dir.join(format!("{}.ldjson", stem)),
            operational: dir.join(format!("{}.log", stem)),
            metrics: dir.join(format!("{}.tsv", stem)),
        }
    }
}

pub fn file_stamp(t: OffsetDateTime) -> String {
    let format = format_description!("[month][day]_[hour][minute][second]");
    t.format(&format).unwrap_or_default()
}

pub fn iso_timestamp(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_default()
}

/// 追加写的输出文件。任何一次写失败都会被记住，调度循环据此提前结束回放
pub struct OutputLogs {
    results: Mutex<LineWriter<File>>,
    operational: Mutex<LineWriter<File>>,
    metrics: Mutex<LineWriter<File>>,
    failure: Mutex<Option<(&'static str, io::ErrorKind, String)>>,
    paths: OutputPaths,
}

impl OutputLogs {
    pub fn open(paths: OutputPaths) -> Result<Self, ReplayError> {
        Ok(OutputLogs {
            results: Mutex::new(open_append(&paths.results)?),
            operational: Mutex::new(open_append(&paths.operational)?),
            metrics: Mutex::new(open_append(&paths.metrics)?),
            failure: Mutex::new(None),
            paths,
        })
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    pub fn write_result(&self, record: &ResultRecord) -> Result<(), ReplayError> {
        let outcome = {
            let mut writer = self.results.lock();
            serde_json::to_writer(&mut *writer, record)
                .map_err(io::Error::from)
                .and_then(|_| writer.write_all(b"\n"))
        };
        self.settle("results", outcome)
    }

    /// 运行日志，每行带时间戳
    pub fn write_operational(&self, message: &str) -> Result<(), ReplayError> {
        let line = format!("{}: {}\n", iso_timestamp(OffsetDateTime::now_utc()), message);
        let outcome = self.operational.lock().write_all(line.as_bytes());
        self.settle("operational", outcome)
    }

    pub fn write_metric(&self, record: &MetricRecord) -> Result<(), ReplayError> {
        let line = format!("{}\n", record.to_tsv_line());
        let outcome = self.metrics.lock().write_all(line.as_bytes());
        self.settle("metrics", outcome)
    }

    pub fn flush(&self) -> Result<(), ReplayError> {
        self.settle("results", self.results.lock().flush())?;
        self.settle("operational", self.operational.lock().flush())?;
        self.settle("metrics", self.metrics.lock().flush())
    }

    /// 之前有写失败就返回那次的错误
    pub fn check(&self) -> Result<(), ReplayError> {
        match &*self.failure.lock() {
            None => Ok(()),
            Some((log, kind, message)) => Err(ReplayError::OutputWrite {
                log: *log,
                source: io::Error::new(*kind, message.clone()),
            }),
        }
    }

    fn settle(&self, log: &'static str, outcome: io::Result<()>) -> Result<(), ReplayError> {
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut failure = self.failure.lock();
                if failure.is_none() {
                    *failure = Some((log, e.kind(), e.to_string()));
                }
                Err(ReplayError::OutputWrite { log, source: e })
            }
        }
    }
}

fn open_append(path: &Path) -> Result<LineWriter<File>, ReplayError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(LineWriter::new)
        .map_err(|source| ReplayError::OutputOpen {
            path: path.to_path_buf(),
            source,
        })
}
