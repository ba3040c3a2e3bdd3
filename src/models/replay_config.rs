use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::models::args::Args;
use crate::models::error::ReplayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// 按记录里的 method/path 原样回放
    Replay,
    /// 固定接口，按请求体区分 search / refinement
    Search,
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub input_paths: Vec<PathBuf>,
    pub concurrency: i64,
    pub delay_ms: u64,
    pub target_host: String,
    pub scheme: String,
    pub tick_interval_ms: u64,
    pub drain_grace_ms: u64,
    pub progress_log_every: u64,
    pub timeout_secs: u64,
    pub max_in_flight: Option<usize>,
    pub headers: Vec<String>,
    pub output_dir: PathBuf,
    pub mode: Mode,
    pub search_endpoint: String,
    pub refinement_path: String,
    pub dry_run: bool,
    pub show_progress: bool,
}

impl ReplayConfig {
    pub fn new(input_paths: Vec<PathBuf>, target_host: impl Into<String>) -> Self {
        ReplayConfig {
            input_paths,
            concurrency: 1,
            delay_ms: 0,
            target_host: target_host.into(),
            scheme: "https".to_string(),
            tick_interval_ms: 5000,
            drain_grace_ms: 10000,
            progress_log_every: 100,
            timeout_secs: 0,
            max_in_flight: None,
            headers: Vec::new(),
            output_dir: PathBuf::from("."),
            mode: Mode::Replay,
            search_endpoint: "/api/v1/search".to_string(),
            refinement_path: "$.navigationName".to_string(),
            dry_run: false,
            show_progress: true,
        }
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.input_paths.is_empty() {
            return Err(ReplayError::Config("至少需要一个回放文件".into()));
        }
        if self.target_host.trim().is_empty() {
            return Err(ReplayError::Config("目标域名不能为空".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ReplayError::Config("统计周期必须大于0".into()));
        }
        if self.progress_log_every == 0 {
            return Err(ReplayError::Config("进度日志间隔必须大于0".into()));
        }
        if self.max_in_flight == Some(0) {
            return Err(ReplayError::Config("在途请求上限必须大于0".into()));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(ReplayError::Config(format!("不支持的协议: {}", self.scheme)));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

impl TryFrom<Args> for ReplayConfig {
    type Error = ReplayError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let config = ReplayConfig {
            input_paths: args.inputs,
            concurrency: args.concurrency,
            delay_ms: args.delay_ms,
            target_host: args.cluster,
            scheme: args.scheme,
            tick_interval_ms: args.tick_ms,
            drain_grace_ms: args.drain_ms,
            progress_log_every: args.progress_every,
            timeout_secs: args.timeout,
            max_in_flight: args.max_in_flight,
            headers: args.headers,
            output_dir: args.out_dir,
            mode: args.mode,
            search_endpoint: args.search_endpoint,
            refinement_path: args.refinement_path,
            dry_run: args.dry_run,
            show_progress: !args.no_progress,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "playback",
            "queries.ldjson",
            "more.ldjson",
            "-c",
            "loadtest.com",
            "-n",
            "10",
            "-d",
            "100",
            "-H",
            "X-Env: perf",
        ]);
        let config = ReplayConfig::try_from(args).unwrap();
        assert_eq!(config.input_paths.len(), 2);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.delay_ms, 100);
        assert_eq!(config.target_host, "loadtest.com");
        assert_eq!(config.tick_interval_ms, 5000);
        assert_eq!(config.drain_grace_ms, 10000);
        assert_eq!(config.progress_log_every, 100);
        assert_eq!(config.headers, vec!["X-Env: perf".to_string()]);
        assert_eq!(config.mode, Mode::Replay);
    }

    #[test]
    fn test_negative_concurrency_is_accepted() {
        let args = Args::parse_from(["playback", "q.ldjson", "-n", "-1"]);
        let config = ReplayConfig::try_from(args).unwrap();
        assert_eq!(config.concurrency, -1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ReplayConfig::new(vec![], "host");
        assert!(matches!(config.validate(), Err(ReplayError::Config(_))));

        config.input_paths.push(PathBuf::from("a.ldjson"));
        assert!(config.validate().is_ok());

        config.tick_interval_ms = 0;
        assert!(config.validate().is_err());
        config.tick_interval_ms = 5000;

        config.scheme = "ftp".into();
        assert!(config.validate().is_err());
        config.scheme = "http".into();

        config.max_in_flight = Some(0);
        assert!(config.validate().is_err());
    }
}
