use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use crate::models::input_record::InputRecord;
use crate::models::request_descriptor::RequestDescriptor;

/// 把一条回放记录变成一个请求
pub trait RequestBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    fn build(&self, record: &InputRecord, line_number: u64) -> anyhow::Result<RequestDescriptor>;
}

/// 按记录里的 method/path 原样回放
pub struct ReplayBuilder {
    scheme: String,
    host: String,
    headers: HeaderMap,
}

impl ReplayBuilder {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, headers: HeaderMap) -> Self {
        ReplayBuilder {
            scheme: scheme.into(),
            host: host.into(),
            headers,
        }
    }
}

impl RequestBuilder for ReplayBuilder {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn build(&self, record: &InputRecord, line_number: u64) -> anyhow::Result<RequestDescriptor> {
        if !record.path.starts_with('/') {
            bail!("path必须以/开头: '{}'", record.path);
        }
        let method = Method::from_str(&record.method.to_uppercase())
            .map_err(|_| anyhow!("无效的方法: '{}'", record.method))?;
        let mut headers = self.headers.clone();
        // 只有POST带请求体
        let body = if method == Method::POST {
            record.body_text()
        } else {
            None
        };
        if body.is_some() && !matches!(record.request_body, Some(Value::String(_))) {
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
        }
        Ok(RequestDescriptor {
            uri: format!("{}://{}{}", self.scheme, self.host, record.path),
            method,
            body,
            headers,
            tag: "replay".to_string(),
            line_number,
            path: record.path.clone(),
        })
    }
}

/// 固定的搜索接口，根据请求体区分普通搜索和 refinement 请求
pub struct SearchBuilder {
    scheme: String,
    host: String,
    endpoint: String,
    refinement_path: String,
    headers: HeaderMap,
}

impl SearchBuilder {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        endpoint: impl Into<String>,
        refinement_path: impl Into<String>,
        headers: HeaderMap,
    ) -> anyhow::Result<Self> {
        let refinement_path = refinement_path.into();
        // 启动时先校验一次jsonpath
        jsonpath_lib::select(&Value::Object(Default::default()), &refinement_path)
            .map_err(|e| anyhow!("无效的jsonpath '{}': {:?}", refinement_path, e))?;
        let mut headers = headers;
        headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(SearchBuilder {
            scheme: scheme.into(),
            host: host.into(),
            endpoint: endpoint.into(),
            refinement_path,
            headers,
        })
    }

    pub fn classify(&self, body: &Value) -> anyhow::Result<&'static str> {
        let selected = jsonpath_lib::select(body, &self.refinement_path)
            .map_err(|e| anyhow!("jsonpath匹配失败: {:?}", e))?;
        let is_refinement = selected.iter().any(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            _ => true,
        });
        Ok(if is_refinement { "refinement" } else { "search" })
    }
}

impl RequestBuilder for SearchBuilder {
    fn name(&self) -> &'static str {
        "search"
    }

    fn build(&self, record: &InputRecord, line_number: u64) -> anyhow::Result<RequestDescriptor> {
        let body = record.body_text().context("缺少 requestBody")?;
        let json = record.body_json().context("requestBody 不是合法的json")?;
        let tag = self.classify(&json)?;
        Ok(RequestDescriptor {
            uri: format!("{}://{}{}", self.scheme, self.host, self.endpoint),
            method: Method::POST,
            body: Some(body),
            headers: self.headers.clone(),
            tag: tag.to_string(),
            line_number,
            path: self.endpoint.clone(),
        })
    }
}
