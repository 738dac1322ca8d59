use std::fs;
use std::path::Path;

use anyhow::Result;
use console::style;
use dialoguer::Confirm;

use crate::install::{INSTALL_DIR, SERVICE_NAME, UNIT_PATH, WEB_ROOT, run_command};

/// Interactive teardown. Service and unit removal always happen; the data
/// directory and provisioned web root only go on explicit opt-in.
pub fn run() -> Result<()> {
    let proceed = Confirm::new()
        .with_prompt("Remove SkyDock Panel from this server?")
        .default(false)
        .interact()?;
    if !proceed {
        println!("Aborted.");
        return Ok(());
    }

    let _ = run_command("systemctl", &["stop", SERVICE_NAME], "Stopping panel");
    let _ = run_command("systemctl", &["disable", SERVICE_NAME], "Disabling panel");

    if Path::new(UNIT_PATH).exists() {
        fs::remove_file(UNIT_PATH)?;
        println!("✅ Removed {}", UNIT_PATH);
    }
    run_command("systemctl", &["daemon-reload"], "Reloading systemd")?;

    let purge_data = Confirm::new()
        .with_prompt(format!(
            "Also delete panel data ({}) and provisioned sites ({})? This cannot be undone.",
            INSTALL_DIR, WEB_ROOT
        ))
        .default(false)
        .interact()?;

    if purge_data {
        if Path::new(INSTALL_DIR).exists() {
            fs::remove_dir_all(INSTALL_DIR)?;
            println!("✅ Removed {}", INSTALL_DIR);
        }
        if Path::new(WEB_ROOT).exists() {
            fs::remove_dir_all(WEB_ROOT)?;
            println!("✅ Removed {}", WEB_ROOT);
        }
        println!("Note: vhost files under /etc/nginx and /etc/apache2 were left in place.");
    } else {
        println!("Panel data kept at {}.", INSTALL_DIR);
    }

    println!("{}", style("Uninstall complete.").green().bold());
    Ok(())
}
