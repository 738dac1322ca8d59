use std::net::TcpStream;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use console::style;

use crate::install::{INSTALL_DIR, SERVICE_NAME, UNIT_PATH};

fn unit_state(unit: &str) -> String {
    Command::new("systemctl")
        .args(["is-active", unit])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn state_line(name: &str, state: &str) {
    let badge = if state == "active" {
        style(state).green()
    } else {
        style(state).red()
    };
    println!("  {:<14} {}", name, badge);
}

/// Print a quick health report: OS, service states, panel reachability.
pub fn run() -> Result<()> {
    let info = os_info::get();
    println!("OS:        {} {}", info.os_type(), info.version());
    println!("User:      {}", whoami::username());
    println!(
        "Unit file: {}",
        if Path::new(UNIT_PATH).exists() { "present" } else { "missing" }
    );
    println!(
        "Data dir:  {}",
        if Path::new(INSTALL_DIR).exists() { "present" } else { "missing" }
    );

    println!("\nServices:");
    for unit in [SERVICE_NAME, "nginx", "apache2", "mysql", "redis-server"] {
        state_line(unit, &unit_state(unit));
    }

    let port = read_panel_port().unwrap_or(8090);
    let addr = format!("127.0.0.1:{}", port);
    print!("\nPanel on {}: ", addr);
    match TcpStream::connect_timeout(&addr.parse()?, Duration::from_secs(2)) {
        Ok(_) => println!("{}", style("reachable").green()),
        Err(e) => println!("{}", style(format!("unreachable ({})", e)).red()),
    }

    Ok(())
}

fn read_panel_port() -> Option<u16> {
    let content = std::fs::read_to_string(Path::new(INSTALL_DIR).join(".env")).ok()?;
    content
        .lines()
        .find_map(|line| line.strip_prefix("SKYDOCK_PANEL_PORT="))
        .and_then(|v| v.trim().parse().ok())
}
