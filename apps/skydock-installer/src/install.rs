use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose;
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use rand::RngCore;

pub const INSTALL_DIR: &str = "/opt/skydock";
pub const WEB_ROOT: &str = "/var/www/skydock";
pub const SERVICE_NAME: &str = "skydock-panel";
pub const UNIT_PATH: &str = "/etc/systemd/system/skydock-panel.service";

const APT_PACKAGES: [&str; 5] = ["nginx", "apache2", "mysql-server", "redis-server", "php-fpm"];

pub fn check_root() -> Result<()> {
    if whoami::username() != "root" {
        return Err(anyhow!("This installer must be run as root."));
    }
    Ok(())
}

pub fn run_command(cmd: &str, args: &[&str], msg: &str) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let output = Command::new(cmd)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if output.status.success() {
        pb.finish_with_message(format!("✅ {}", msg));
        Ok(())
    } else {
        pb.finish_with_message(format!("❌ {}", msg));
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(anyhow!(
            "Command failed: {} {:?}\nstderr: {}",
            cmd,
            args,
            if stderr.is_empty() { "<empty>" } else { &stderr },
        ))
    }
}

fn run_command_optional(cmd: &str, args: &[&str], msg: &str) -> Result<()> {
    let output = Command::new(cmd)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if output.status.success() {
        println!("✅ {}", msg);
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            println!("ℹ️ {} (skipped)", msg);
        } else {
            println!("ℹ️ {} (skipped: {})", msg, stderr);
        }
    }
    Ok(())
}

fn unit_installed() -> bool {
    Path::new(UNIT_PATH).exists()
}

/// Entry point for `skydock-installer install`. Idempotent: an existing
/// install turns into an update (binary swap + restart) unless --force.
pub fn run(force: bool) -> Result<()> {
    let info = os_info::get();
    println!("Detected OS: {} {}", info.os_type(), info.version());

    if unit_installed() && !force {
        println!("{}", style("Existing install detected — running in update mode.").yellow());
        return update();
    }

    install_packages()?;
    remap_apache_ports()?;
    create_directories()?;
    install_panel_binary()?;
    write_env_file()?;
    write_unit_file()?;

    run_command("systemctl", &["daemon-reload"], "Reloading systemd")?;
    run_command_optional("systemctl", &["enable", "--now", "nginx"], "Enabling Nginx")?;
    run_command_optional("systemctl", &["enable", "--now", "mysql"], "Enabling MySQL")?;
    run_command(
        "systemctl",
        &["enable", "--now", SERVICE_NAME],
        "Starting SkyDock Panel",
    )?;

    let port = read_env_value("SKYDOCK_PANEL_PORT").unwrap_or_else(|| "8090".to_string());
    println!();
    println!("{}", style("Installation complete.").green().bold());
    println!("Panel: http://<YOUR_SERVER_IP>:{}", port);
    println!("Sign in with any system account (e.g. root).");
    Ok(())
}

fn update() -> Result<()> {
    run_command_optional("systemctl", &["stop", SERVICE_NAME], "Stopping panel")?;
    install_panel_binary()?;
    write_unit_file()?;
    run_command("systemctl", &["daemon-reload"], "Reloading systemd")?;
    run_command("systemctl", &["restart", SERVICE_NAME], "Restarting panel")?;
    println!("{}", style("Update complete.").green().bold());
    Ok(())
}

fn install_packages() -> Result<()> {
    run_command("apt-get", &["update", "-q"], "Updating package lists")?;
    let mut args = vec!["install", "-y", "-q"];
    args.extend_from_slice(&APT_PACKAGES);
    run_command("apt-get", &args, "Installing nginx, apache2, mysql, redis, php-fpm")?;
    // wp-cli is only needed for automated WordPress installs; best effort.
    run_command_optional(
        "apt-get",
        &["install", "-y", "-q", "wp-cli"],
        "Installing wp-cli",
    )
}

/// Nginx owns :80 as the front proxy; Apache moves to 8080. Only rewrites
/// configs that still carry the stock port so re-runs are no-ops.
fn remap_apache_ports() -> Result<()> {
    let ports_conf = Path::new("/etc/apache2/ports.conf");
    if ports_conf.exists() {
        let content = fs::read_to_string(ports_conf)?;
        if content.contains("Listen 80\n") {
            fs::write(ports_conf, content.replace("Listen 80\n", "Listen 8080\n"))?;
            println!("✅ Remapped Apache to port 8080");
        } else {
            println!("ℹ️ Apache ports.conf already customized, leaving as-is");
        }
    }

    let default_vhost = Path::new("/etc/apache2/sites-available/000-default.conf");
    if default_vhost.exists() {
        let content = fs::read_to_string(default_vhost)?;
        if content.contains("<VirtualHost *:80>") {
            fs::write(
                default_vhost,
                content.replace("<VirtualHost *:80>", "<VirtualHost *:8080>"),
            )?;
        }
    }

    Ok(())
}

fn create_directories() -> Result<()> {
    fs::create_dir_all(INSTALL_DIR)?;
    fs::create_dir_all(WEB_ROOT)?;
    println!("✅ Created {} and {}", INSTALL_DIR, WEB_ROOT);
    Ok(())
}

/// The panel binary ships alongside the installer; copy it into place.
fn install_panel_binary() -> Result<()> {
    let installer = std::env::current_exe()?;
    let source = installer
        .parent()
        .map(|dir| dir.join(SERVICE_NAME))
        .filter(|p| p.exists())
        .ok_or_else(|| {
            anyhow!("Panel binary '{}' not found next to the installer", SERVICE_NAME)
        })?;

    let target = Path::new(INSTALL_DIR).join(SERVICE_NAME);
    fs::copy(&source, &target)?;
    run_command("chmod", &["755", &target.to_string_lossy()], "Marking panel executable")?;
    Ok(())
}

fn env_path() -> std::path::PathBuf {
    Path::new(INSTALL_DIR).join(".env")
}

fn read_env_value(key: &str) -> Option<String> {
    let content = fs::read_to_string(env_path()).ok()?;
    content.lines().find_map(|line| {
        line.strip_prefix(&format!("{}=", key)).map(|v| v.trim().to_string())
    })
}

/// Write /opt/skydock/.env on first install; an existing file is preserved
/// so re-running never rotates the encryption key under stored secrets.
fn write_env_file() -> Result<()> {
    let path = env_path();
    if path.exists() {
        println!("ℹ️ {} already exists, keeping it", path.display());
        return Ok(());
    }

    let port: String = Input::new()
        .with_prompt("Panel port")
        .default("8090".to_string())
        .interact_text()?;
    let port: u16 = port.trim().parse().map_err(|_| anyhow!("Panel port must be a number"))?;

    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    let encryption_key = general_purpose::STANDARD.encode(key);

    let content = format!(
        "DEBUG=false\n\
         DATABASE_URL=sqlite://{dir}/skydock.db\n\
         SKYDOCK_PANEL_PORT={port}\n\
         SKYDOCK_WEB_ROOT={web_root}\n\
         SKYDOCK_ENCRYPTION_KEY={key}\n\
         SKYDOCK_NGINX_SITES_AVAILABLE=/etc/nginx/sites-available\n\
         SKYDOCK_NGINX_SITES_ENABLED=/etc/nginx/sites-enabled\n\
         SKYDOCK_APACHE_SITES_AVAILABLE=/etc/apache2/sites-available\n",
        dir = INSTALL_DIR,
        port = port,
        web_root = WEB_ROOT,
        key = encryption_key,
    );

    fs::write(&path, content)?;
    run_command("chmod", &["600", &path.to_string_lossy()], "Restricting .env permissions")?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

fn write_unit_file() -> Result<()> {
    let unit = format!(
        r#"[Unit]
Description=SkyDock VPS Control Panel
After=network.target mysql.service

[Service]
Type=simple
User=root
WorkingDirectory={dir}
ExecStart={dir}/{bin} serve
Restart=always
EnvironmentFile={dir}/.env

[Install]
WantedBy=multi-user.target
"#,
        dir = INSTALL_DIR,
        bin = SERVICE_NAME,
    );

    fs::write(UNIT_PATH, unit)?;
    println!("✅ Wrote {}", UNIT_PATH);
    Ok(())
}
