use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument prints the help and the current configuration.
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
    // Feed credentials live in the feed file, so every variable here is safe to print
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "SFL_DATABASE_URL",
        "SFL_DB_MAX_CONNECTIONS",
        "SFL_BANK_FEEDS_FILE",
        "SFL_POLL_INTERVAL_SECS",
        "SFL_AMOUNT_TOLERANCE_VND",
        "SFL_REFERENCE_PREFIX",
        "SFL_AUTO_CREATE_DEPOSITS",
        "SFL_UNPAID_ORDER_TIMEOUT",
        "SFL_REFERRAL_ENABLED",
        "SFL_REFERRAL_PERCENT",
        "SFL_REFERRAL_MAX_REWARD_VND",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
