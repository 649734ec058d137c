//! # Prometheus 指标收集模块
//!
//! 提供进程级的指标注册表与文本导出，各服务在自己的 metrics 模块中定义具体指标。

use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};

/// 全局指标注册表
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// 以 Prometheus 文本格式导出注册表中的全部指标
pub fn gather_text(registry: &Registry) -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntCounterVec, Opts};

    #[test]
    fn test_gather_text_contains_registered_counter() {
        let registry = Registry::new();
        let counter = IntCounterVec::new(Opts::new("demo_total", "demo counter"), &["kind"]).unwrap();
        registry.register(Box::new(counter.clone())).unwrap();
        counter.with_label_values(&["a"]).inc();

        let text = gather_text(&registry).unwrap();
        assert!(text.contains("demo_total{kind=\"a\"} 1"));
    }
}
