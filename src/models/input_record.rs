use serde::Deserialize;
use serde_json::{Map, Value};

/// 回放文件中的一行记录
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub path: String,
    // 旧的抓包文件里字段是全小写
    #[serde(default, alias = "requestbody")]
    pub request_body: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl InputRecord {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// 请求体原文：字符串原样发送，其他json值序列化后发送
    pub fn body_text(&self) -> Option<String> {
        match &self.request_body {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// 请求体的json形式，字符串形式的请求体会尝试再解析一次
    pub fn body_json(&self) -> Option<Value> {
        match &self.request_body {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => serde_json::from_str(s).ok(),
            Some(other) => Some(other.clone()),
        }
    }
}
