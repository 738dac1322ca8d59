use std::net::UdpSocket;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use sysinfo::{Disks, System};
use tokio::sync::Mutex;
use tracing::warn;

use crate::exec::CommandRunner;

/// Services surfaced on the dashboard and controllable via the API.
pub const WATCHED_SERVICES: [&str; 4] = ["nginx", "apache2", "mysql", "redis-server"];

const VALID_ACTIONS: [&str; 4] = ["start", "stop", "restart", "reload"];

#[derive(Debug, Clone, Serialize)]
pub struct LoadAverage {
    #[serde(rename = "1min")]
    pub one: f64,
    #[serde(rename = "5min")]
    pub five: f64,
    #[serde(rename = "15min")]
    pub fifteen: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuMetrics {
    pub count: usize,
    pub percent: f32,
    pub load_average: LoadAverage,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskMetrics {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UptimeMetrics {
    pub seconds: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub hostname: String,
    pub ip_address: String,
    pub os_name: String,
    pub os_version: String,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub uptime: UptimeMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub installed: bool,
    pub running: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads live OS state (metrics, service status) and issues service commands.
/// Nothing here is cached; every call reflects "as of last poll".
pub struct SystemService {
    runner: Arc<dyn CommandRunner>,
    stats: Arc<Mutex<System>>,
}

impl SystemService {
    pub fn new(runner: Arc<dyn CommandRunner>, stats: Arc<Mutex<System>>) -> Self {
        Self { runner, stats }
    }

    pub async fn metrics(&self) -> SystemMetrics {
        let (cpu_count, cpu_percent, mem_total, mem_used, mem_available) = {
            let mut sys = self.stats.lock().await;
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            (
                sys.cpus().len(),
                sys.global_cpu_usage(),
                sys.total_memory(),
                sys.used_memory(),
                sys.available_memory(),
            )
        };

        let mem_percent = if mem_total > 0 {
            mem_used as f64 / mem_total as f64 * 100.0
        } else {
            0.0
        };

        let (disk_total, disk_free) = root_disk_usage();
        let disk_used = disk_total.saturating_sub(disk_free);
        let disk_percent = if disk_total > 0 {
            disk_used as f64 / disk_total as f64 * 100.0
        } else {
            0.0
        };

        let load = System::load_average();
        let uptime = System::uptime();

        SystemMetrics {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            ip_address: detect_ip(),
            os_name: System::name().unwrap_or_else(|| "unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
            cpu: CpuMetrics {
                count: cpu_count,
                percent: cpu_percent,
                load_average: LoadAverage { one: load.one, five: load.five, fifteen: load.fifteen },
            },
            memory: MemoryMetrics {
                total: mem_total,
                used: mem_used,
                available: mem_available,
                percent: mem_percent,
            },
            disk: DiskMetrics {
                total: disk_total,
                used: disk_used,
                free: disk_free,
                percent: disk_percent,
            },
            uptime: UptimeMetrics {
                seconds: uptime,
                days: uptime / 86_400,
                hours: (uptime % 86_400) / 3_600,
                minutes: (uptime % 3_600) / 60,
            },
        }
    }

    /// `which` decides installed, `systemctl is-active` decides running.
    /// Unknown services come back as `not_installed`, never as an error.
    pub async fn service_status(&self, service: &str) -> Result<ServiceStatus> {
        let which = self.runner.run("which", &[service], false).await?;
        if !which.success() {
            return Ok(ServiceStatus {
                installed: false,
                running: false,
                status: "not_installed".to_string(),
                status_text: None,
            });
        }

        let active = self.runner.run("systemctl", &["is-active", service], false).await?;
        let running = active.success();

        let detail = self
            .runner
            .run("systemctl", &["status", service, "--no-pager"], false)
            .await?;
        let status_text = if detail.success() { detail.stdout } else { detail.stderr };

        Ok(ServiceStatus {
            installed: true,
            running,
            status: if running { "running" } else { "stopped" }.to_string(),
            status_text: Some(status_text),
        })
    }

    /// start/stop/restart/reload a unit. Invalid actions are rejected before
    /// anything is spawned. Two simultaneous calls for the same unit race at
    /// the OS level; the panel does not arbitrate.
    pub async fn control(&self, service: &str, action: &str) -> Result<ControlOutcome> {
        if !VALID_ACTIONS.contains(&action) {
            return Ok(ControlOutcome {
                success: false,
                message: format!(
                    "Invalid action. Must be one of: {}",
                    VALID_ACTIONS.join(", ")
                ),
                status: None,
                error: None,
            });
        }

        let output = self.runner.run("systemctl", &[action, service], true).await?;
        if output.success() {
            let status = self.service_status(service).await.ok();
            Ok(ControlOutcome {
                success: true,
                message: format!("Service {} {}ed successfully", service, action),
                status,
                error: None,
            })
        } else {
            warn!("systemctl {} {} failed: {}", action, service, output.stderr.trim());
            Ok(ControlOutcome {
                success: false,
                message: format!("Failed to {} service: {}", action, output.stderr.trim()),
                status: None,
                error: Some(output.stderr),
            })
        }
    }

    pub async fn service_logs(&self, service: &str, lines: u32) -> Result<String> {
        let output = self
            .runner
            .run(
                "journalctl",
                &["-u", service, "-n", &lines.to_string(), "--no-pager"],
                false,
            )
            .await?;
        Ok(if output.success() { output.stdout } else { output.stderr })
    }
}

/// Outbound IP via a UDP connect probe; nothing is actually sent.
fn detect_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn root_disk_usage() -> (u64, u64) {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .or_else(|| disks.list().first());
    match root {
        Some(disk) => (disk.total_space(), disk.available_space()),
        None => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::MockRunner;

    fn service(runner: MockRunner) -> SystemService {
        SystemService::new(
            Arc::new(runner),
            Arc::new(Mutex::new(System::new())),
        )
    }

    #[tokio::test]
    async fn unknown_action_is_rejected_before_spawning() {
        let svc = service(MockRunner::new());
        let outcome = svc.control("nginx", "explode").await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains("Invalid action"));
    }

    #[tokio::test]
    async fn missing_service_reports_not_installed() {
        let svc = service(MockRunner::failing("which", "not found"));
        let status = svc.service_status("no-such-daemon").await.unwrap();
        assert!(!status.installed);
        assert!(!status.running);
        assert_eq!(status.status, "not_installed");
    }

    #[tokio::test]
    async fn failed_control_carries_stderr() {
        let svc = service(MockRunner::failing("systemctl", "Unit nginx.service not found."));
        let outcome = svc.control("nginx", "restart").await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains("Unit nginx.service not found."));
    }

    #[tokio::test]
    async fn successful_control_rechecks_status() {
        let runner = MockRunner::new();
        let svc = service(runner);
        let outcome = svc.control("nginx", "restart").await.unwrap();
        assert!(outcome.success);
        assert!(outcome.message.contains("restarted successfully"));
        assert!(outcome.status.is_some());
    }
}
