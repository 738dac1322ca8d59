use std::env;
use std::fs;

use anyhow::{Context, Result};

use crate::config::Config;

/// Write a systemd unit pointing at this binary and print how to enable it.
/// Must run as root since it touches /etc/systemd/system.
pub fn install_service() -> Result<()> {
    if unsafe { libc::getuid() } != 0 {
        return Err(anyhow::anyhow!(
            "This command must be run as root (sudo) to install the systemd service."
        ));
    }

    let exe_path = env::current_exe()?;
    let working_dir = env::current_dir()?;

    let service_content = format!(
        r#"[Unit]
Description=SkyDock VPS Control Panel
After=network.target

[Service]
Type=simple
User=root
WorkingDirectory={}
ExecStart={} serve
Restart=always
EnvironmentFile={}/.env

[Install]
WantedBy=multi-user.target
"#,
        working_dir.display(),
        exe_path.display(),
        working_dir.display()
    );

    let service_path = "/etc/systemd/system/skydock-panel.service";
    fs::write(service_path, service_content)
        .with_context(|| format!("Failed to write service file to {}", service_path))?;

    println!("Systemd service created at {}", service_path);
    println!("You can now start the service using:");
    println!("  systemctl daemon-reload");
    println!("  systemctl enable --now skydock-panel");

    Ok(())
}

pub fn print_info(config: &Config) {
    println!("\n=== SKYDOCK PANEL INFO ===");
    println!("Panel URL:  http://<YOUR_SERVER_IP>:{}", config.panel_port);
    println!("Database:   {}", config.database_url);
    println!("Web root:   {}", config.web_root.display());
    println!("==========================\n");
}
