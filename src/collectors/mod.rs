pub mod system;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuLoad {
    pub current_load_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryReading {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpuController {
    pub name: String,
    pub utilization_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeReading {
    pub mount: String,
    pub size_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceRate {
    pub iface: String,
    pub rx_bytes_per_sec: Option<f64>,
    pub tx_bytes_per_sec: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostReading {
    /// 1, 5 and 15 minute load averages.
    pub load_average: [f64; 3],
    pub uptime_seconds: u64,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{query} query failed: {message}")]
    Query {
        query: &'static str,
        message: String,
    },
    #[error("system sampler lock poisoned")]
    Poisoned,
    #[error("{query} query task did not complete: {message}")]
    Join {
        query: &'static str,
        message: String,
    },
}

/// Host introspection backend. Every query is blocking and is run on the
/// blocking pool by the aggregator.
pub trait MetricsSource: Send + Sync + 'static {
    fn current_load(&self) -> Result<CpuLoad, SourceError>;
    fn memory(&self) -> Result<MemoryReading, SourceError>;
    fn graphics(&self) -> Result<Vec<GpuController>, SourceError>;
    fn file_systems(&self) -> Result<Vec<VolumeReading>, SourceError>;
    fn network_stats(&self) -> Result<Vec<InterfaceRate>, SourceError>;
    fn host(&self) -> Result<HostReading, SourceError>;
}

#[cfg(test)]
pub mod fixed {
    use super::*;

    /// Source returning canned readings; `fail` makes the named query error out.
    #[derive(Debug, Clone)]
    pub struct FixedSource {
        pub load: CpuLoad,
        pub memory: MemoryReading,
        pub gpus: Vec<GpuController>,
        pub volumes: Vec<VolumeReading>,
        pub interfaces: Vec<InterfaceRate>,
        pub host: HostReading,
        pub fail: Option<&'static str>,
    }

    impl FixedSource {
        pub fn typical() -> Self {
            Self {
                load: CpuLoad {
                    current_load_percent: 37.26,
                },
                memory: MemoryReading {
                    total_bytes: 16 * 1024 * 1024 * 1024,
                    available_bytes: 4 * 1024 * 1024 * 1024,
                },
                gpus: vec![
                    GpuController {
                        name: "gpu0".to_string(),
                        utilization_percent: Some(40.0),
                    },
                    GpuController {
                        name: "gpu1".to_string(),
                        utilization_percent: Some(61.0),
                    },
                    GpuController {
                        name: "igpu".to_string(),
                        utilization_percent: None,
                    },
                ],
                volumes: vec![
                    VolumeReading {
                        mount: "/".to_string(),
                        size_bytes: Some(512 * 1024 * 1024 * 1024),
                        used_bytes: Some(256 * 1024 * 1024 * 1024),
                    },
                    VolumeReading {
                        mount: "/data".to_string(),
                        size_bytes: Some(512 * 1024 * 1024 * 1024),
                        used_bytes: None,
                    },
                ],
                interfaces: vec![
                    InterfaceRate {
                        iface: "eth0".to_string(),
                        rx_bytes_per_sec: Some(1024.0 * 1024.0),
                        tx_bytes_per_sec: Some(512.0 * 1024.0),
                    },
                    InterfaceRate {
                        iface: "wlan0".to_string(),
                        rx_bytes_per_sec: Some(512.0 * 1024.0),
                        tx_bytes_per_sec: None,
                    },
                ],
                host: HostReading {
                    load_average: [0.456, 0.3, 0.2],
                    uptime_seconds: 7 * 3600 + 3599,
                },
                fail: None,
            }
        }

        fn check(&self, query: &'static str) -> Result<(), SourceError> {
            match self.fail {
                Some(name) if name == query => Err(SourceError::Query {
                    query,
                    message: "simulated failure".to_string(),
                }),
                _ => Ok(()),
            }
        }
    }

    impl MetricsSource for FixedSource {
        fn current_load(&self) -> Result<CpuLoad, SourceError> {
            self.check("load")?;
            Ok(self.load)
        }

        fn memory(&self) -> Result<MemoryReading, SourceError> {
            self.check("memory")?;
            Ok(self.memory)
        }

        fn graphics(&self) -> Result<Vec<GpuController>, SourceError> {
            self.check("graphics")?;
            Ok(self.gpus.clone())
        }

        fn file_systems(&self) -> Result<Vec<VolumeReading>, SourceError> {
            self.check("file_systems")?;
            Ok(self.volumes.clone())
        }

        fn network_stats(&self) -> Result<Vec<InterfaceRate>, SourceError> {
            self.check("network")?;
            Ok(self.interfaces.clone())
        }

        fn host(&self) -> Result<HostReading, SourceError> {
            self.check("host")?;
            Ok(self.host)
        }
    }
}
