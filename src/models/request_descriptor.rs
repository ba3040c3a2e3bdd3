use reqwest::header::HeaderMap;
use reqwest::Method;

/// 由一条回放记录构建出来的请求，只归属于发出它的那个任务
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub uri: String,
    pub method: Method,
    pub body: Option<String>,
    pub headers: HeaderMap,
    // 分类标签，比如 search / refinement / replay
    pub tag: String,
    pub line_number: u64,
    // 原始记录里的path，写结果日志用
    pub path: String,
}
