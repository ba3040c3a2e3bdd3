use std::path::PathBuf;

use clap::Parser;

use crate::models::replay_config::Mode;

const AFTER_HELP: &str = "\
输出文件:
  playback_{n}_{d}_{timestamp}.ldjson  每个请求一行结果
  playback_{n}_{d}_{timestamp}.tsv     每个统计周期每个维度一行汇总
  playback_{n}_{d}_{timestamp}.log     进度和错误日志

示例:
  playback queries.ldjson -c loadtest.com -n 10 -d 100

参考配置:
  850 qps :  n=100, d=0
  600 qps :  n=6,   d=10  (100*6)
  480 qps :  n=15,  d=30  (33*15)
  140 qps :  n=15,  d=100 (10*15)";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None, after_help = AFTER_HELP)]
pub struct Args {
    /// 回放文件（每行一个json），可以传多个
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// 每批并发请求数，<=0 表示不限流
    #[arg(short = 'n', long, default_value_t = 1, allow_negative_numbers = true)]
    pub concurrency: i64,

    /// 两批请求之间的间隔（毫秒）
    #[arg(short = 'd', long, default_value_t = 0)]
    pub delay_ms: u64,

    /// 目标域名/集群
    #[arg(short = 'c', long, default_value = "localhost")]
    pub cluster: String,

    /// 协议
    #[arg(long, default_value = "https")]
    pub scheme: String,

    /// 统计周期（毫秒）
    #[arg(long, default_value_t = 5000)]
    pub tick_ms: u64,

    /// 读完文件后等待未完成请求的时间（毫秒）
    #[arg(long, default_value_t = 10000)]
    pub drain_ms: u64,

    /// 每隔多少行写一次进度日志
    #[arg(long, default_value_t = 100)]
    pub progress_every: u64,

    /// 超时时间（秒），0 表示不设置
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,

    /// 同时在途请求的硬上限，默认不限制
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// 额外的请求头，格式 "Key: Value"，可以重复
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// 输出目录
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// 请求构建方式
    #[arg(long, value_enum, default_value_t = Mode::Replay)]
    pub mode: Mode,

    /// search 模式下固定的接口路径
    #[arg(long, default_value = "/api/v1/search")]
    pub search_endpoint: String,

    /// search 模式下判定为 refinement 请求的jsonpath
    #[arg(long, default_value = "$.navigationName")]
    pub refinement_path: String,

    /// 不发真实请求，用模拟传输层跑一遍
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// 不显示等待进度
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}
