use std::process::{Command, Output};

/// Runs `cmd` after echoing it, capturing its output.
pub fn run_args(cmd: &str, args: &[&str]) -> Result<Output, String> {
    let shown: Vec<String> = args.iter().map(|s| shell_escape(s)).collect();
    eprintln!("$ {cmd} {}", shown.join(" "));
    Command::new(cmd)
        .args(args)
        .output()
        .map_err(|e| format!("Failed to run {cmd}: {e}"))
}

pub fn format_output(o: &Output) -> String {
    let mut s = String::new();
    for (label, bytes) in [("stdout", &o.stdout), ("stderr", &o.stderr)] {
        if bytes.is_empty() {
            continue;
        }
        s.push_str(label);
        s.push_str(":\n");
        s.push_str(&String::from_utf8_lossy(bytes));
        if !s.ends_with('\n') {
            s.push('\n');
        }
    }
    if s.is_empty() {
        s.push_str("(no output)\n");
    }
    s
}

fn shell_escape(s: &str) -> String {
    if s.chars().all(|c| c.is_ascii_alphanumeric() || "-_./:".contains(c)) {
        return s.to_string();
    }
    format!("{s:?}")
}
