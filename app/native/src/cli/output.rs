//! CLI output formatting.

use std::io::IsTerminal;
use std::time::Duration;

use colored::Colorize;

/// Prints `value` as pretty JSON, highlighted when stdout is a terminal.
///
/// Colors: keys cyan, strings green, numbers yellow, booleans and null magenta.
pub fn print_json(value: &serde_json::Value) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string());
    if std::io::stdout().is_terminal() {
        println!("{}", highlight_json(&json));
    } else {
        println!("{json}");
    }
}

/// Colors a pretty-printed JSON document.
fn highlight_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len() * 2);
    let mut token = String::new();
    let mut in_string = false;
    let mut escape_next = false;
    let mut after_colon = false;
    let mut containers = Vec::new();

    for ch in json.chars() {
        if in_string {
            token.push(ch);
            if escape_next {
                escape_next = false;
            } else if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                let colored = if after_colon { token.green() } else { token.cyan() };
                out.push_str(&colored.to_string());
                token.clear();
                in_string = false;
                after_colon = false;
            }
            continue;
        }

        match ch {
            '"' => {
                flush_scalar(&mut out, &mut token);
                token.push(ch);
                in_string = true;
            }
            ':' => {
                flush_scalar(&mut out, &mut token);
                out.push(':');
                after_colon = true;
            }
            ',' | '{' | '}' | '[' | ']' => {
                flush_scalar(&mut out, &mut token);
                out.push_str(&ch.to_string().bold().to_string());
                match ch {
                    '{' | '[' => containers.push(ch),
                    '}' | ']' => {
                        containers.pop();
                    }
                    _ => {}
                }
                // Array items are values, object entries start with a key.
                after_colon = containers.last() == Some(&'[') && matches!(ch, '[' | ',');
            }
            _ => token.push(ch),
        }
    }

    flush_scalar(&mut out, &mut token);
    out
}

/// Writes a pending number/boolean/null token, keeping its whitespace.
fn flush_scalar(out: &mut String, token: &mut String) {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        out.push_str(token);
    } else {
        let start = token.find(trimmed).unwrap_or(0);
        let end = start + trimmed.len();
        out.push_str(&token[..start]);
        if matches!(trimmed, "true" | "false" | "null") {
            out.push_str(&trimmed.magenta().to_string());
        } else {
            out.push_str(&trimmed.yellow().to_string());
        }
        out.push_str(&token[end..]);
    }
    token.clear();
}

/// Formats a polling interval for tables: `300 ms`, `2 s`, `1.5 s`, `5 min`.
#[must_use]
pub fn format_interval(interval: Duration) -> String {
    let millis = interval.as_millis();
    if millis < 1000 {
        format!("{millis} ms")
    } else if millis % 60_000 == 0 {
        format!("{} min", millis / 60_000)
    } else if millis % 1000 == 0 {
        format!("{} s", millis / 1000)
    } else {
        format!("{:.1} s", interval.as_secs_f64())
    }
}

/// Formats a boolean as a colored mark.
#[must_use]
pub fn format_bool(value: bool) -> String {
    if value {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}
