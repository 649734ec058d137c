//! 路由指标（分配结果、选择来源、解析延迟）

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// 路由指标集合
#[derive(Clone)]
pub struct RoutingMetrics {
    /// 分配结果计数（sticky / created / assigned / reselected / race_recovered）
    pub assignments_total: IntCounterVec,
    /// 实例选择来源计数（primary / fallback / none）
    pub selection_total: IntCounterVec,
    /// 流媒体配置解析延迟（毫秒）
    pub resolve_duration_ms: HistogramVec,
}

impl RoutingMetrics {
    pub fn new(registry: Option<&Registry>) -> prometheus::Result<Arc<Self>> {
        let assignments_total = IntCounterVec::new(
            Opts::new(
                "routing_assignments_total",
                "Client to instance assignments by outcome",
            ),
            &["outcome"],
        )?;

        let selection_total = IntCounterVec::new(
            Opts::new(
                "routing_selection_total",
                "Instance selections by result",
            ),
            &["result"],
        )?;

        let resolve_duration_ms = HistogramVec::new(
            HistogramOpts::new(
                "routing_resolve_duration_ms",
                "Streaming config resolution latency in milliseconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0]),
            &["status"],
        )?;

        if let Some(reg) = registry {
            // 重复注册（例如多次初始化）时忽略错误
            let _ = reg.register(Box::new(assignments_total.clone()));
            let _ = reg.register(Box::new(selection_total.clone()));
            let _ = reg.register(Box::new(resolve_duration_ms.clone()));
        }

        Ok(Arc::new(Self {
            assignments_total,
            selection_total,
            resolve_duration_ms,
        }))
    }

    pub fn record_assignment(&self, outcome: &str) {
        self.assignments_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_selection(&self, result: &str) {
        self.selection_total.with_label_values(&[result]).inc();
    }

    pub fn observe_resolve(&self, status: &str, elapsed_ms: f64) {
        self.resolve_duration_ms
            .with_label_values(&[status])
            .observe(elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_count() {
        let registry = Registry::new();
        let metrics = RoutingMetrics::new(Some(&registry)).unwrap();
        metrics.record_assignment("sticky");
        metrics.record_assignment("sticky");
        metrics.record_selection("fallback");
        metrics.observe_resolve("ok", 3.0);

        assert_eq!(
            metrics.assignments_total.with_label_values(&["sticky"]).get(),
            2
        );
        let text = user_service_core::metrics::gather_text(&registry).unwrap();
        assert!(text.contains("routing_selection_total{result=\"fallback\"} 1"));
        assert!(text.contains("routing_resolve_duration_ms_count{status=\"ok\"} 1"));
    }
}
