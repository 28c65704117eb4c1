use std::{env, env::VarError};

/// The worker takes no arguments. Any argument prints the help text and the current configuration instead.
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
    const DISPLAY_ENVS: [&str; 11] = [
        "RUST_LOG",
        "FMP_DATABASE_URL",
        "FMP_DB_MAX_CONNECTIONS",
        "FMP_CURRENCY",
        "FMP_EVENT_BUFFER_SIZE",
        "FMP_RESERVATION_TIMEOUT",
        "FMP_REPAIR_INTERVAL",
        "FMP_PAYMENT_POLLING",
        "FMP_PAYMENT_POLL_INTERVAL",
        "FMP_PAYMENT_POLL_BATCH",
        "FMP_STRIPE_API_URL",
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
