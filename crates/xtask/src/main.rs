//! Workspace maintenance tasks: `cargo run -p xtask -- <command>`.
use std::env;

mod process;

use process::{format_output, run_args};

fn main() {
    let mut args = env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "verify".to_string());
    let result = match cmd.as_str() {
        "verify" => verify(),
        "fmt" => fmt_check(),
        "clippy" => clippy(),
        "lint" => lint_strict(),
        "check-unused" => check_unused(),
        "test" => test_workspace(),
        "structures" => test_verified_structures(),
        _ => usage_error(&cmd),
    };
    if let Err(msg) = result {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

const COMMANDS: &str = "verify|fmt|clippy|lint|check-unused|test|structures";

fn usage_error(cmd: &str) -> Result<(), String> {
    Err(format!(
        "Unknown command: {cmd}\nUsage: cargo run -p xtask -- <{COMMANDS}>"
    ))
}

fn verify() -> Result<(), String> {
    fmt_check()?;
    lint_strict()?;
    test_workspace()?;
    test_verified_structures()?;
    Ok(())
}

fn fmt_check() -> Result<(), String> {
    checked("cargo", &["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<(), String> {
    checked(
        "cargo",
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
    )
}

fn lint_strict() -> Result<(), String> {
    checked(
        "cargo",
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
            "-W",
            "clippy::all",
            "-W",
            "clippy::perf",
        ],
    )
}

fn check_unused() -> Result<(), String> {
    checked("cargo", &["udeps", "--workspace"])
}

fn test_workspace() -> Result<(), String> {
    checked("cargo", &["test", "--workspace"])
}

/// Release-mode run of the runtime tests with every new structure checked.
fn test_verified_structures() -> Result<(), String> {
    checked(
        "cargo",
        &[
            "test",
            "-p",
            "luma_runtime",
            "--release",
            "--features",
            "verify-structures",
        ],
    )
}

fn checked(cmd: &str, args: &[&str]) -> Result<(), String> {
    let o = run_args(cmd, args)?;
    if !o.status.success() {
        let shown = args.join(" ");
        let output = format_output(&o);
        return Err(format!("{cmd} {shown} failed:\n{output}"));
    }
    Ok(())
}
