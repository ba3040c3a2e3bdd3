/// 可重置的样本收集器，百分位用最近秩法计算
#[derive(Debug, Clone)]
pub struct StatAccumulator {
    samples: Vec<f64>,
    // 样本是否已经有序，避免每次取百分位都重新排序
    sorted: bool,
}

/// 一次性算出来的统计结果，没有样本时百分位和范围都是 None
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p95: Option<f64>,
    pub range: Option<(f64, f64)>,
}

impl Default for StatAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatAccumulator {
    pub fn new() -> Self {
        StatAccumulator {
            samples: Vec::new(),
            sorted: true,
        }
    }

    /// 非有限值（NaN、无穷）直接丢弃并返回 false
    pub fn push(&mut self, sample: f64) -> bool {
        if !sample.is_finite() {
            return false;
        }
        if let Some(last) = self.samples.last() {
            if *last > sample {
                self.sorted = false;
            }
        }
        self.samples.push(sample);
        true
    }

    /// 清空样本，保留已分配的容量
    pub fn reset(&mut self) {
        self.samples.clear();
        self.sorted = true;
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 每秒样本数
    pub fn rate(&self, per_seconds: f64) -> f64 {
        if per_seconds <= 0.0 {
            return 0.0;
        }
        self.samples.len() as f64 / per_seconds
    }

    pub fn percentile(&mut self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        self.ensure_sorted();
        let n = self.samples.len();
        // 先乘后除，整数百分位时结果是精确的
        let rank = (p.clamp(0.0, 100.0) * n as f64 / 100.0).ceil() as usize;
        Some(self.samples[rank.clamp(1, n) - 1])
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        if self.sorted {
            return match (self.samples.first(), self.samples.last()) {
                (Some(min), Some(max)) => Some((*min, *max)),
                _ => None,
            };
        }
        self.samples.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((f64::min(min, v), f64::max(max, v))),
        })
    }

    pub fn summary(&mut self) -> Summary {
        Summary {
            count: self.count(),
            p50: self.percentile(50.0),
            p75: self.percentile(75.0),
            p95: self.percentile(95.0),
            range: self.range(),
        }
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.samples.sort_by(f64::total_cmp);
            self.sorted = true;
        }
    }
}
