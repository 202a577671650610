use std::{env, env::VarError};

/// The kiosk takes no arguments. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "VMC_DATABASE_URL",
        "VMC_REMOTE_ORDERS_URL",
        "VMC_REMOTE_POLL_INTERVAL_MS",
        "VMC_REMOTE_TIMEOUT_MS",
        "VMC_PAYMENT_MODE",
        "VMC_INPUT_TIMEOUT_SECS",
        "VMC_RFID_TIMEOUT_SECS",
        "VMC_QR_SCAN_TIMEOUT_SECS",
        "VMC_MAX_FAILED_LOGINS",
        "VMC_ADMIN_CHAT_ID",
        "VMC_STALE_ORDER_TIMEOUT_MINS",
        "VMC_SECURITY_MONITOR",
        "VMC_SIMULATE_HARDWARE",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
