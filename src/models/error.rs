use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("line {line}: invalid record: {source}")]
    InputParse {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: skipped: {reason}")]
    Rejected { line: u64, reason: String },
    #[error("line {line}: request error: {message}")]
    Transport { line: u64, message: String },
    #[error("Error while reading file {path:?}. line# {line}: {source}")]
    FileRead {
        path: PathBuf,
        line: u64,
        #[source]
        source: io::Error,
    },
    #[error("cannot open output file {path:?}: {source}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write to {log} log failed: {source}")]
    OutputWrite {
        log: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReplayError {
    /// 只影响当前输入文件的错误，其余文件继续回放
    pub fn is_file_local(&self) -> bool {
        matches!(self, ReplayError::FileRead { .. })
    }
}
