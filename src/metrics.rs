use crate::snapshot::MetricsSnapshot;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prometheus view of the daemon itself plus the most recent snapshot.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at_unix: i64,
    pub dashd_cpu_usage_percent: Gauge,
    pub dashd_gpu_usage_percent: Gauge,
    pub dashd_ram_usage_percent: Gauge,
    pub dashd_disk_usage_percent: Gauge,
    pub dashd_net_in_mbps: Gauge,
    pub dashd_net_out_mbps: Gauge,
    pub dashd_last_snapshot_timestamp_seconds: Gauge,
    pub dashd_snapshots_total: Counter,
    pub dashd_snapshot_failures_total: Counter,
    pub dashd_shortcut_requests_total: CounterVec,
    pub dashd_shortcuts: Gauge,
    pub dashd_scrape_count_total: Counter,
    pub dashd_uptime_seconds: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let dashd_cpu_usage_percent = Gauge::with_opts(opts!(
            "dashd_cpu_usage_percent",
            "CPU usage in the last served snapshot (0..100)"
        ))?;
        let dashd_gpu_usage_percent = Gauge::with_opts(opts!(
            "dashd_gpu_usage_percent",
            "Mean GPU utilization in the last served snapshot (0..100)"
        ))?;
        let dashd_ram_usage_percent = Gauge::with_opts(opts!(
            "dashd_ram_usage_percent",
            "RAM usage in the last served snapshot (0..100)"
        ))?;
        let dashd_disk_usage_percent = Gauge::with_opts(opts!(
            "dashd_disk_usage_percent",
            "Usage across all volumes in the last served snapshot (0..100)"
        ))?;
        let dashd_net_in_mbps = Gauge::with_opts(opts!(
            "dashd_net_in_mbps",
            "Received MB/s summed over interfaces in the last served snapshot"
        ))?;
        let dashd_net_out_mbps = Gauge::with_opts(opts!(
            "dashd_net_out_mbps",
            "Transmitted MB/s summed over interfaces in the last served snapshot"
        ))?;
        let dashd_last_snapshot_timestamp_seconds = Gauge::with_opts(opts!(
            "dashd_last_snapshot_timestamp_seconds",
            "Unix time of the last served snapshot"
        ))?;
        let dashd_snapshots_total = Counter::with_opts(opts!(
            "dashd_snapshots_total",
            "Metrics snapshots served"
        ))?;
        let dashd_snapshot_failures_total = Counter::with_opts(opts!(
            "dashd_snapshot_failures_total",
            "Metrics snapshots that failed to aggregate"
        ))?;
        let dashd_shortcut_requests_total = CounterVec::new(
            opts!(
                "dashd_shortcut_requests_total",
                "Shortcut API requests by operation and outcome"
            ),
            &["operation", "outcome"],
        )?;
        let dashd_shortcuts = Gauge::with_opts(opts!(
            "dashd_shortcuts",
            "Shortcuts in the store as of the last list or write"
        ))?;
        let dashd_scrape_count_total = Counter::with_opts(opts!(
            "dashd_scrape_count_total",
            "Scrapes of this endpoint"
        ))?;
        let dashd_uptime_seconds =
            Gauge::with_opts(opts!("dashd_uptime_seconds", "Daemon uptime in seconds"))?;

        register(&registry, &dashd_cpu_usage_percent)?;
        register(&registry, &dashd_gpu_usage_percent)?;
        register(&registry, &dashd_ram_usage_percent)?;
        register(&registry, &dashd_disk_usage_percent)?;
        register(&registry, &dashd_net_in_mbps)?;
        register(&registry, &dashd_net_out_mbps)?;
        register(&registry, &dashd_last_snapshot_timestamp_seconds)?;
        register(&registry, &dashd_snapshots_total)?;
        register(&registry, &dashd_snapshot_failures_total)?;
        register(&registry, &dashd_shortcut_requests_total)?;
        register(&registry, &dashd_shortcuts)?;
        register(&registry, &dashd_scrape_count_total)?;
        register(&registry, &dashd_uptime_seconds)?;

        Ok(Arc::new(Self {
            registry,
            started_at_unix: now_unix(),
            dashd_cpu_usage_percent,
            dashd_gpu_usage_percent,
            dashd_ram_usage_percent,
            dashd_disk_usage_percent,
            dashd_net_in_mbps,
            dashd_net_out_mbps,
            dashd_last_snapshot_timestamp_seconds,
            dashd_snapshots_total,
            dashd_snapshot_failures_total,
            dashd_shortcut_requests_total,
            dashd_shortcuts,
            dashd_scrape_count_total,
            dashd_uptime_seconds,
        }))
    }

    pub fn update_from_snapshot(&self, snapshot: &MetricsSnapshot) {
        self.dashd_snapshots_total.inc();
        self.dashd_cpu_usage_percent.set(snapshot.cpu.usage);
        self.dashd_gpu_usage_percent.set(snapshot.gpu.usage);
        self.dashd_ram_usage_percent.set(snapshot.ram.used_pct);
        self.dashd_disk_usage_percent.set(snapshot.disk.used_pct);
        self.dashd_net_in_mbps.set(snapshot.network.in_mbps);
        self.dashd_net_out_mbps.set(snapshot.network.out_mbps);
        self.dashd_last_snapshot_timestamp_seconds
            .set(snapshot.ts as f64 / 1000.0);
    }

    pub fn inc_snapshot_failure(&self) {
        self.dashd_snapshot_failures_total.inc();
    }

    pub fn observe_shortcut_request(&self, operation: &str, outcome: &str) {
        self.dashd_shortcut_requests_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn set_shortcut_count(&self, count: usize) {
        self.dashd_shortcuts.set(count as f64);
    }

    pub fn inc_scrape_count(&self) {
        self.dashd_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.dashd_uptime_seconds
            .set(now_unix().saturating_sub(self.started_at_unix) as f64);

        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{CpuStat, ExtraStat, GpuStat, NetStat, UsageStat};

    #[test]
    fn snapshot_gauges_are_exported() {
        let metrics = Metrics::new().expect("metrics init");
        metrics.update_from_snapshot(&MetricsSnapshot {
            cpu: CpuStat { usage: 12.5 },
            gpu: GpuStat { usage: 0.0 },
            ram: UsageStat {
                used_pct: 40.0,
                used_gb: 4,
                total_gb: 10,
            },
            disk: UsageStat {
                used_pct: 10.0,
                used_gb: 1,
                total_gb: 10,
            },
            network: NetStat {
                in_mbps: 1.25,
                out_mbps: 0.0,
            },
            extra: ExtraStat {
                load_avg: 0.1,
                uptime_hours: 1,
            },
            ts: 1_700_000_000_000,
        });
        metrics.observe_shortcut_request("create", "ok");

        let text = String::from_utf8(metrics.encode_metrics().unwrap()).unwrap();
        assert!(text.contains("dashd_cpu_usage_percent 12.5"));
        assert!(text.contains("dashd_snapshots_total 1"));
        assert!(text.contains("dashd_shortcut_requests_total{operation=\"create\",outcome=\"ok\"} 1"));
        assert!(text.contains("dashd_uptime_seconds"));
    }
}
