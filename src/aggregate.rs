use crate::collectors::{
    CpuLoad, GpuController, HostReading, InterfaceRate, MemoryReading, MetricsSource, SourceError,
    VolumeReading,
};
use crate::snapshot::{
    clamp_percent, now_unix_millis, percent_of, round_to, whole_gb, CpuStat, ExtraStat, GpuStat,
    MetricsSnapshot, NetStat, UsageStat, BYTES_PER_MB,
};
use std::sync::Arc;
use tracing::debug;

/// Everything one snapshot is computed from.
#[derive(Debug, Clone)]
pub struct SourceReadings {
    pub load: CpuLoad,
    pub memory: MemoryReading,
    pub gpus: Vec<GpuController>,
    pub volumes: Vec<VolumeReading>,
    pub interfaces: Vec<InterfaceRate>,
    pub host: HostReading,
}

#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn MetricsSource>,
}

impl Aggregator {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self { source }
    }

    /// Runs every source query concurrently and folds the results into one
    /// snapshot. The first failing query fails the whole call.
    pub async fn snapshot(&self) -> Result<MetricsSnapshot, SourceError> {
        let (load, memory, gpus, volumes, interfaces, host) = tokio::try_join!(
            query(&self.source, "load", |s| s.current_load()),
            query(&self.source, "memory", |s| s.memory()),
            query(&self.source, "graphics", |s| s.graphics()),
            query(&self.source, "file_systems", |s| s.file_systems()),
            query(&self.source, "network", |s| s.network_stats()),
            query(&self.source, "host", |s| s.host()),
        )?;

        let readings = SourceReadings {
            load,
            memory,
            gpus,
            volumes,
            interfaces,
            host,
        };
        Ok(aggregate(&readings, now_unix_millis()))
    }
}

async fn query<T, F>(
    source: &Arc<dyn MetricsSource>,
    name: &'static str,
    run: F,
) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce(&dyn MetricsSource) -> Result<T, SourceError> + Send + 'static,
{
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || run(source.as_ref()))
        .await
        .map_err(|err| SourceError::Join {
            query: name,
            message: err.to_string(),
        })?
}

pub fn aggregate(readings: &SourceReadings, ts_millis: i64) -> MetricsSnapshot {
    let cpu_usage = clamp_percent(readings.load.current_load_percent);

    let gpu_loads: Vec<f64> = readings
        .gpus
        .iter()
        .filter_map(|g| match g.utilization_percent {
            Some(v) if v.is_finite() => Some(v),
            _ => {
                debug!(gpu = %g.name, "GPU reported no utilization");
                None
            }
        })
        .collect();
    let gpu_usage = if gpu_loads.is_empty() {
        0.0
    } else {
        clamp_percent(gpu_loads.iter().sum::<f64>() / gpu_loads.len() as f64)
    };

    let mem_total = readings.memory.total_bytes;
    let mem_used = if mem_total == 0 {
        0
    } else {
        mem_total.saturating_sub(readings.memory.available_bytes)
    };
    let ram = UsageStat {
        used_pct: round_to(percent_of(mem_used as f64, mem_total as f64), 1),
        used_gb: whole_gb(mem_used as f64),
        total_gb: whole_gb(mem_total as f64),
    };

    let (disk_total, disk_used) = readings.volumes.iter().fold((0_u64, 0_u64), |acc, v| {
        if v.size_bytes.is_none() || v.used_bytes.is_none() {
            debug!(mount = %v.mount, "volume reported no size; counted as 0");
        }
        (
            acc.0.saturating_add(v.size_bytes.unwrap_or(0)),
            acc.1.saturating_add(v.used_bytes.unwrap_or(0)),
        )
    });
    let disk = UsageStat {
        used_pct: round_to(percent_of(disk_used as f64, disk_total as f64), 1),
        used_gb: whole_gb(disk_used as f64),
        total_gb: whole_gb(disk_total as f64),
    };

    let (rx, tx) = readings.interfaces.iter().fold((0.0_f64, 0.0_f64), |acc, i| {
        if i.rx_bytes_per_sec.is_none() || i.tx_bytes_per_sec.is_none() {
            debug!(iface = %i.iface, "interface reported no rate; counted as 0");
        }
        (
            acc.0 + non_negative(i.rx_bytes_per_sec),
            acc.1 + non_negative(i.tx_bytes_per_sec),
        )
    });

    MetricsSnapshot {
        cpu: CpuStat {
            usage: round_to(cpu_usage, 1),
        },
        gpu: GpuStat {
            usage: round_to(gpu_usage, 1),
        },
        ram,
        disk,
        network: NetStat {
            in_mbps: round_to(rx / BYTES_PER_MB, 2),
            out_mbps: round_to(tx / BYTES_PER_MB, 2),
        },
        extra: ExtraStat {
            load_avg: round_to(non_negative(Some(readings.host.load_average[0])), 2),
            uptime_hours: readings.host.uptime_seconds / 3600,
        },
        ts: ts_millis,
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}
