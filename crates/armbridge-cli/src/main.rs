//! `armbridge-cli` – operator shell for the armbridge robot bridge.
//!
//! This binary:
//!
//! 1. Loads `~/.armbridge/config.toml`; runs a short **first-run wizard**
//!    when the file is absent.
//! 2. Initialises structured logging (`RUST_LOG`, `ARMBRIDGE_LOG_FORMAT`).
//! 3. Drops the user into an **interactive REPL** driving one
//!    [`RobotManager`].
//! 4. Intercepts **Ctrl-C** to send an emergency stop, disconnect and exit.

mod config;
mod repl;

use std::sync::Arc;
use std::time::Duration;

use armbridge_kernel::RobotManager;
use colored::Colorize;
use tracing::{info, warn};

use crate::config::{Config, LogFormat};

fn main() {
    // ── Configuration ─────────────────────────────────────────────────────
    // Loaded before logging so `log_format` in the file is honoured.
    let loaded = config::load();
    let first_run = matches!(loaded, Ok(None));
    let (mut cfg, load_note) = match loaded {
        Ok(Some(cfg)) => (cfg, None),
        Ok(None) => (Config::default(), None),
        Err(e) => (Config::default(), Some(e)),
    };
    config::apply_env_overrides(&mut cfg);

    init_tracing(cfg.log_format);
    print_banner();

    if let Some(e) = load_note {
        println!("{}: {}", "Config error".red(), e);
        println!("  Using default configuration.");
    } else if first_run {
        cfg = run_first_run_wizard(cfg);
    } else {
        println!(
            "  Config loaded from {}",
            config::config_path().display().to_string().bold()
        );
    }

    // ── Runtime and manager ───────────────────────────────────────────────
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };
    let manager = Arc::new(RobotManager::with_builtin_adapters());

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // Runs on the ctrlc thread, outside the runtime, so it may block_on.
    let handle = runtime.handle().clone();
    let stop_manager = Arc::clone(&manager);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – emergency stop …".yellow().bold());
        handle.block_on(async {
            stop_manager.emergency_stop().await;
            if tokio::time::timeout(Duration::from_secs(2), stop_manager.disconnect())
                .await
                .is_err()
            {
                warn!("disconnect did not finish before exit");
            }
        });
        println!("{}", "  ✓ Robot stopped and released.".green());
        println!("{}", "  ✓ Exiting armbridge.".green());
        std::process::exit(130);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will not stop the robot");
    }

    println!();
    println!(
        "  Default robot: {}{}",
        cfg.default_robot_type.bold(),
        if cfg.default_endpoint.is_empty() {
            String::new()
        } else {
            format!(" @ {}", cfg.default_endpoint)
        }
    );
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());
    info!(robot_types = manager.list_robot_types().len(), "shell ready");

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(runtime.handle().clone(), Arc::clone(&manager), cfg);
    runtime.shutdown_timeout(Duration::from_secs(1));
}

/// `RUST_LOG` selects the filter (default `info`); `format` picks JSON or
/// compact output.
fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard(mut cfg: Config) -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      armbridge First-Run Wizard      ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Pick the robot you use most.\n");
    println!("    dobot  universal  abb  kuka  arduino  custom");

    cfg.default_robot_type = prompt_line(
        &format!("  Default robot type [{}]: ", cfg.default_robot_type),
        &cfg.default_robot_type,
    );
    cfg.default_endpoint = prompt_line(
        "  Default endpoint (IP, host:port or serial port) []: ",
        &cfg.default_endpoint,
    );

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __ _ _ __ _ __ ___ | |__  _ __(_) __| | __ _  ___ "#.bold().cyan());
    println!("{}", r#"  / _` | '__| '_ ` _ \| '_ \| '__| |/ _` |/ _` |/ _ \"#.bold().cyan());
    println!("{}", r#" | (_| | |  | | | | | | |_) | |  | | (_| | (_| |  __/"#.bold().cyan());
    println!("{}", r#"  \__,_|_|  |_| |_| |_|_.__/|_|  |_|\__,_|\__, |\___|"#.bold().cyan());
    println!("{}", r#"                                          |___/     "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "armbridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  One control surface for many robot arms");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
