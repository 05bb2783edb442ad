//! Integration test common infrastructure.
//!
//! The engine is a client, so the tests play the server: [`FakeServer`]
//! accepts the engine's connection and exchanges raw lines with it.

pub mod server;

#[allow(unused_imports)]
pub use server::{FakeServer, Peer};

use relaybot::config::Config;
use std::path::Path;

/// Config pointing at `servers` with fast retries and no rate limit.
#[allow(dead_code)]
pub fn test_config(servers: &[String], data_root: &Path, autoload: &[&str]) -> Config {
    let quote = |s: &str| format!("{:?}", s);
    let servers: Vec<String> = servers.iter().map(|s| quote(s)).collect();
    let autoload: Vec<String> = autoload.iter().map(|s| quote(s)).collect();
    let text = format!(
        r#"
servers = [{servers}]

[identity]
nick = "relay"

[connection]
retry_delay_secs = 0
reconnect_backoff_secs = 0
connect_timeout_secs = 5

[rate_limit]
enabled = false

[modules]
autoload = [{autoload}]
data_root = {root}
"#,
        servers = servers.join(", "),
        autoload = autoload.join(", "),
        root = quote(&data_root.display().to_string()),
    );
    toml::from_str(&text).expect("test config parses")
}
