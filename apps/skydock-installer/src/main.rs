use clap::{Parser, Subcommand};
use console::style;
use std::process::exit;

mod diagnose;
mod install;
mod uninstall;

#[derive(Parser)]
#[command(name = "skydock-installer")]
#[command(about = "SkyDock Panel Installer & Manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install or update SkyDock Panel
    Install {
        /// Force a full reinstall even if the panel is already present
        #[arg(long)]
        force: bool,
    },
    /// Remove SkyDock Panel
    Uninstall,
    /// Run diagnostics
    Diagnose,
}

fn main() {
    let cli = Cli::parse();

    println!("{}", style(format!("SkyDock Installer v{}", env!("CARGO_PKG_VERSION"))).bold().cyan());
    println!("{}", style("==========================").cyan());

    if let Err(e) = install::check_root() {
        eprintln!("{}", style(format!("Error: {}", e)).red());
        exit(1);
    }

    let result = match cli.command {
        Commands::Install { force } => install::run(force),
        Commands::Uninstall => uninstall::run(),
        Commands::Diagnose => diagnose::run(),
    };

    if let Err(e) = result {
        eprintln!("{}", style(format!("Failed: {}", e)).red());
        eprintln!("Check the output above and journalctl -u skydock-panel for details.");
        exit(1);
    }
}
