use anyhow::anyhow;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

// 回放时默认绕过服务端缓存
const DEFAULT_HEADERS: [(&str, &str); 1] = [("skip-caching", "true")];

/// 解析 "Key: Value" 形式的请求头，同名时后面的覆盖前面的
pub(crate) fn parse_headers(raw: &[String]) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in DEFAULT_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    for header in raw {
        let mut parts = header.splitn(2, ':');
        match (parts.next(), parts.next()) {
            (Some(name), Some(value)) => {
                let header_name = name
                    .trim()
                    .parse::<HeaderName>()
                    .map_err(|_| anyhow!("无法解析头部名称: '{}'", name.trim()))?;
                let header_value = HeaderValue::from_str(value.trim())
                    .map_err(|_| anyhow!("无法解析头部值: '{}'", value.trim()))?;
                headers.insert(header_name, header_value);
            }
            _ => return Err(anyhow!("请求头格式应为 'Key: Value': '{}'", header)),
        }
    }
    Ok(headers)
}
