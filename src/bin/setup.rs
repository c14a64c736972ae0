//! Boatswain setup wizard.
//!
//! Prompts on the terminal for the platform API and bot settings, then writes
//! a `config.toml` into `$BOATSWAIN_ROOT` (default: the current directory).

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

// ── Config formatting ──────────────────────────────────────────────────────────

struct ConfigParams<'a> {
    host: &'a str,
    access_token: &'a str,
    subscriptions_endpoint: &'a str,
    subscribe_endpoint: &'a str,
    send_endpoint: &'a str,
    webhook_url: &'a str,
    listen: &'a str,
    phrase: &'a str,
    reply: &'a str,
}

/// Escape a value for a TOML basic string.
fn toml_str(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> String {
    let host = toml_str(p.host);
    let access_token = toml_str(p.access_token);
    let subscriptions_endpoint = toml_str(p.subscriptions_endpoint);
    let subscribe_endpoint = toml_str(p.subscribe_endpoint);
    let send_endpoint = toml_str(p.send_endpoint);
    let webhook_url = toml_str(p.webhook_url);
    let listen = toml_str(p.listen);
    let phrase = toml_str(p.phrase);
    let reply = toml_str(p.reply);

    let token_line = if p.access_token.is_empty() {
        "# access_token = \"...\"  (or set BOATSWAIN_ACCESS_TOKEN)".to_owned()
    } else {
        format!("access_token = \"{access_token}\"")
    };

    format!(
        r#"[api]
scheme = "https"
host = "{host}"
token_param = "access_token"
{token_line}
subscriptions_endpoint = "{subscriptions_endpoint}"
subscribe_endpoint = "{subscribe_endpoint}"
send_endpoint = "{send_endpoint}"
request_timeout_secs = 30

[bot]
webhook_url = "{webhook_url}"
listen = "{listen}"
phrase = "{phrase}"
reply = "{reply}"
"#
    )
}

// ── CLI ────────────────────────────────────────────────────────────────────────

fn run_cli(project_root: &Path) -> Result<()> {
    println!("=== Boatswain Setup ===\n");

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let or_default = |s: String, default: &str| {
        if s.is_empty() {
            default.to_owned()
        } else {
            s
        }
    };

    let host = or_default(read_line("API host [api.ok.ru]: ")?, "api.ok.ru");
    let access_token = read_line("Access token (empty to use BOATSWAIN_ACCESS_TOKEN): ")?;
    let subscriptions_endpoint = or_default(
        read_line("Subscriptions endpoint [/graph/me/subscriptions]: ")?,
        "/graph/me/subscriptions",
    );
    let subscribe_endpoint = or_default(
        read_line("Subscribe endpoint [/graph/me/subscribe]: ")?,
        "/graph/me/subscribe",
    );
    let send_endpoint = or_default(
        read_line("Send endpoint [/graph/me/messages/{chat_id}]: ")?,
        "/graph/me/messages/{chat_id}",
    );
    let webhook_url = read_line("Public webhook URL (e.g. https://bot.example.com/msg): ")?;
    let listen = or_default(
        read_line("Local listen endpoint [http://0.0.0.0:8080/msg]: ")?,
        "http://0.0.0.0:8080/msg",
    );
    let phrase = or_default(read_line("Trigger phrase [/joke]: ")?, "/joke");
    let reply = read_line("Reply text: ")?;

    let config = format_config(&ConfigParams {
        host: &host,
        access_token: &access_token,
        subscriptions_endpoint: &subscriptions_endpoint,
        subscribe_endpoint: &subscribe_endpoint,
        send_endpoint: &send_endpoint,
        webhook_url: &webhook_url,
        listen: &listen,
        phrase: &phrase,
        reply: &reply,
    });

    let config_path = project_root.join("config.toml");
    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Run the bot with:  cargo run");
    Ok(())
}

fn main() -> Result<()> {
    // Resolve project root: prefer BOATSWAIN_ROOT env, fall back to cwd.
    let project_root =
        PathBuf::from(std::env::var("BOATSWAIN_ROOT").unwrap_or_else(|_| ".".to_string()));

    run_cli(&project_root)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
