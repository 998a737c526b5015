use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One point-in-time reading of the host, shaped for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub cpu: CpuStat,
    pub gpu: GpuStat,
    pub ram: UsageStat,
    pub disk: UsageStat,
    pub network: NetStat,
    pub extra: ExtraStat,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuStat {
    pub usage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuStat {
    pub usage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStat {
    #[serde(rename = "usedPct")]
    pub used_pct: f64,
    #[serde(rename = "usedGB")]
    pub used_gb: u64,
    #[serde(rename = "totalGB")]
    pub total_gb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetStat {
    #[serde(rename = "inMBps")]
    pub in_mbps: f64,
    #[serde(rename = "outMBps")]
    pub out_mbps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraStat {
    #[serde(rename = "loadAvg")]
    pub load_avg: f64,
    #[serde(rename = "uptimeHours")]
    pub uptime_hours: u64,
}

/// Clamps to 0..=100. Non-finite input collapses to 0.
pub fn clamp_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

pub fn round_to(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10_f64.powi(digits);
    (value * factor).round() / factor
}

/// `part / total * 100`, or 0 when the total is empty.
pub fn percent_of(part: f64, total: f64) -> f64 {
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    clamp_percent(part / total * 100.0)
}

pub fn whole_gb(bytes: f64) -> u64 {
    let gb = (bytes / BYTES_PER_GB).round();
    if gb.is_finite() && gb > 0.0 {
        gb as u64
    } else {
        0
    }
}

pub fn now_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert_eq!(percent_of(10.0, 0.0), 0.0);
        assert_eq!(percent_of(0.0, 0.0), 0.0);
        assert_eq!(percent_of(150.0, 100.0), 100.0);
    }

    #[test]
    fn clamp_and_round_handle_non_finite() {
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(-3.0), 0.0);
        assert_eq!(round_to(f64::INFINITY, 1), 0.0);
        assert_eq!(round_to(12.345, 1), 12.3);
        assert_eq!(round_to(0.125, 2), 0.13);
    }

    #[test]
    fn serializes_dashboard_field_names() {
        let snapshot = MetricsSnapshot {
            cpu: CpuStat { usage: 1.0 },
            gpu: GpuStat { usage: 0.0 },
            ram: UsageStat {
                used_pct: 50.0,
                used_gb: 8,
                total_gb: 16,
            },
            disk: UsageStat {
                used_pct: 25.0,
                used_gb: 100,
                total_gb: 400,
            },
            network: NetStat {
                in_mbps: 0.5,
                out_mbps: 0.25,
            },
            extra: ExtraStat {
                load_avg: 0.42,
                uptime_hours: 3,
            },
            ts: 1,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["ram"]["usedPct"], 50.0);
        assert_eq!(value["disk"]["totalGB"], 400);
        assert_eq!(value["network"]["outMBps"], 0.25);
        assert_eq!(value["extra"]["uptimeHours"], 3);
        assert_eq!(value["ts"], 1);
    }
}
