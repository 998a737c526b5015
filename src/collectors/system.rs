use crate::collectors::{
    CpuLoad, GpuController, HostReading, InterfaceRate, MemoryReading, MetricsSource, SourceError,
    VolumeReading,
};
use std::collections::HashMap;
use std::process::Command;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use sysinfo::{CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt};
use tracing::debug;

/// How often the interface list is rebuilt; between rebuilds only counters are refreshed.
const NETWORK_LIST_REFRESH: Duration = Duration::from_secs(30);

struct CpuSampler {
    system: System,
    baseline_at: Instant,
    primed: bool,
}

struct NetSampler {
    system: System,
    /// Cumulative (received, transmitted) bytes per interface at `sampled_at`.
    totals: HashMap<String, (u64, u64)>,
    sampled_at: Instant,
    list_refreshed_at: Instant,
}

impl NetSampler {
    fn current_totals(&self) -> Vec<(String, u64, u64)> {
        self.system
            .networks()
            .iter()
            .map(|(iface, data)| {
                (
                    iface.to_string(),
                    data.total_received(),
                    data.total_transmitted(),
                )
            })
            .collect()
    }
}

/// `MetricsSource` backed by `sysinfo`, with GPU utilization from `nvidia-smi`.
///
/// Each concern owns its own `System` so the aggregator's parallel queries do
/// not queue behind one another.
pub struct SysinfoSource {
    cpu: Mutex<CpuSampler>,
    memory: Mutex<System>,
    disks: Mutex<System>,
    network: Mutex<NetSampler>,
    nvidia_smi: bool,
}

impl SysinfoSource {
    pub fn new(nvidia_smi: bool) -> Self {
        let now = Instant::now();

        let mut cpu = System::new();
        cpu.refresh_cpu();

        let mut net = System::new();
        net.refresh_networks_list();
        let mut network = NetSampler {
            system: net,
            totals: HashMap::new(),
            sampled_at: now,
            list_refreshed_at: now,
        };
        network.totals = network
            .current_totals()
            .into_iter()
            .map(|(iface, rx, tx)| (iface, (rx, tx)))
            .collect();

        Self {
            cpu: Mutex::new(CpuSampler {
                system: cpu,
                baseline_at: now,
                primed: false,
            }),
            memory: Mutex::new(System::new()),
            disks: Mutex::new(System::new()),
            network: Mutex::new(network),
            nvidia_smi,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, SourceError> {
    mutex.lock().map_err(|_| SourceError::Poisoned)
}

impl MetricsSource for SysinfoSource {
    fn current_load(&self) -> Result<CpuLoad, SourceError> {
        // CPU usage is a delta between two refreshes; the baseline was taken in new().
        let wait = {
            let sampler = lock(&self.cpu)?;
            if sampler.primed {
                Duration::ZERO
            } else {
                System::MINIMUM_CPU_UPDATE_INTERVAL.saturating_sub(sampler.baseline_at.elapsed())
            }
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }

        let mut sampler = lock(&self.cpu)?;
        sampler.primed = true;
        sampler.system.refresh_cpu();
        let usage = sampler.system.global_cpu_info().cpu_usage() as f64;
        Ok(CpuLoad {
            current_load_percent: usage,
        })
    }

    fn memory(&self) -> Result<MemoryReading, SourceError> {
        let mut system = lock(&self.memory)?;
        system.refresh_memory();
        Ok(MemoryReading {
            total_bytes: system.total_memory(),
            available_bytes: system.available_memory(),
        })
    }

    fn graphics(&self) -> Result<Vec<GpuController>, SourceError> {
        if !self.nvidia_smi {
            return Ok(Vec::new());
        }
        Ok(collect_nvidia_smi())
    }

    fn file_systems(&self) -> Result<Vec<VolumeReading>, SourceError> {
        let mut system = lock(&self.disks)?;
        system.refresh_disks_list();
        system.refresh_disks();
        let volumes = system
            .disks()
            .iter()
            .map(|d| {
                let total = d.total_space();
                VolumeReading {
                    mount: d.mount_point().to_string_lossy().to_string(),
                    size_bytes: Some(total),
                    used_bytes: Some(total.saturating_sub(d.available_space())),
                }
            })
            .collect();
        Ok(volumes)
    }

    fn network_stats(&self) -> Result<Vec<InterfaceRate>, SourceError> {
        let mut sampler = lock(&self.network)?;
        let now = Instant::now();
        if now.duration_since(sampler.list_refreshed_at) >= NETWORK_LIST_REFRESH {
            sampler.system.refresh_networks_list();
            sampler.list_refreshed_at = now;
        } else {
            sampler.system.refresh_networks();
        }

        let elapsed = now.duration_since(sampler.sampled_at).as_secs_f64();
        let current = sampler.current_totals();
        let rates = rates_since(&sampler.totals, &current, elapsed);

        sampler.totals = current
            .into_iter()
            .map(|(iface, rx, tx)| (iface, (rx, tx)))
            .collect();
        sampler.sampled_at = now;
        Ok(rates)
    }

    fn host(&self) -> Result<HostReading, SourceError> {
        let system = lock(&self.memory)?;
        let load = system.load_average();
        Ok(HostReading {
            load_average: [load.one, load.five, load.fifteen],
            uptime_seconds: system.uptime(),
        })
    }
}

/// Per-interface byte rates from two readings of the cumulative counters.
/// Interfaces without a previous reading report no rate; a counter that went
/// backwards (reset or wrap) reports 0.
fn rates_since(
    previous: &HashMap<String, (u64, u64)>,
    current: &[(String, u64, u64)],
    elapsed_secs: f64,
) -> Vec<InterfaceRate> {
    current
        .iter()
        .map(|(iface, rx, tx)| {
            let prev = previous.get(iface).filter(|_| elapsed_secs > 0.0);
            InterfaceRate {
                iface: iface.clone(),
                rx_bytes_per_sec: prev.map(|(p, _)| rx.saturating_sub(*p) as f64 / elapsed_secs),
                tx_bytes_per_sec: prev.map(|(_, p)| tx.saturating_sub(*p) as f64 / elapsed_secs),
            }
        })
        .collect()
}

fn collect_nvidia_smi() -> Vec<GpuController> {
    let output = run_nvidia_smi(&[
        "--query-gpu=index,name,utilization.gpu",
        "--format=csv,noheader,nounits",
    ]);

    let Some(output) = output else {
        return Vec::new();
    };
    if !output.status.success() {
        debug!(status = ?output.status.code(), "nvidia-smi exited with failure");
        return Vec::new();
    }

    let Ok(text) = String::from_utf8(output.stdout) else {
        return Vec::new();
    };
    parse_nvidia_smi(&text)
}

fn parse_nvidia_smi(text: &str) -> Vec<GpuController> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(|v| v.trim()).collect();
            if parts.len() < 3 {
                return None;
            }
            Some(GpuController {
                name: format!("{} {}", parts[0], parts[1]),
                utilization_percent: parse_f64_loose(parts[2]),
            })
        })
        .collect()
}

fn run_nvidia_smi(args: &[&str]) -> Option<std::process::Output> {
    if let Ok(output) = Command::new("nvidia-smi").args(args).output() {
        return Some(output);
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(output) = Command::new(r"C:\Windows\System32\nvidia-smi.exe")
            .args(args)
            .output()
        {
            return Some(output);
        }
    }

    None
}

fn parse_f64_loose(input: &str) -> Option<f64> {
    // nvidia-smi prints "[N/A]" or "[Not Supported]" for missing values.
    let v = input.trim().trim_end_matches('%').trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}
