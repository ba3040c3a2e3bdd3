use std::collections::HashMap;

use reqwest::StatusCode;

use crate::models::outcome::FailureKind;

/// 按 (状态码, 类别) 统计失败次数，传输层错误的状态码记为0。
///
/// 键的取值有限，具体路径和错误信息只写进运行日志。
#[derive(Debug, Default, Clone)]
pub struct HttpErrorStats {
    pub(crate) errors: HashMap<(u16, &'static str), u32>,
}

impl HttpErrorStats {
    pub(crate) fn new() -> Self {
        HttpErrorStats {
            errors: HashMap::new(),
        }
    }

    pub(crate) fn increment_status(&mut self, status_code: u16) {
        let reason = StatusCode::from_u16(status_code)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unknown status");
        *self.errors.entry((status_code, reason)).or_insert(0) += 1;
    }

    pub(crate) fn increment_transport(&mut self, kind: FailureKind) {
        *self.errors.entry((0, kind.name())).or_insert(0) += 1;
    }

    pub(crate) fn total(&self) -> u64 {
        self.errors.values().map(|c| *c as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_stay_bounded() {
        let mut stats = HttpErrorStats::new();
        for _ in 0..1000 {
            stats.increment_status(503);
            stats.increment_status(404);
            stats.increment_transport(FailureKind::Timeout);
        }
        stats.increment_status(599);
        assert_eq!(stats.errors.len(), 4);
        assert_eq!(stats.errors.get(&(503, "Service Unavailable")), Some(&1000));
        assert_eq!(stats.errors.get(&(0, "timeout")), Some(&1000));
        assert_eq!(stats.errors.get(&(599, "unknown status")), Some(&1));
        assert_eq!(stats.total(), 3001);
    }
}
