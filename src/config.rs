use clap::Parser;
use std::time::Duration;

/// Reference mailbox capacity.
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Parser, Debug, Clone)]
#[command(name = "agents-coop-mcp")]
#[command(about = "An MCP server that lets cooperating agents exchange messages through bounded mailboxes")]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, env = "BIND_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Maximum number of undelivered messages per agent mailbox
    #[arg(long, env = "MAILBOX_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Default wait for `get` in seconds when the caller gives none.
    /// Without it, `get` waits until a message arrives or the server stops.
    #[arg(long, env = "GET_TIMEOUT")]
    pub get_timeout: Option<f64>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.capacity == 0 {
            anyhow::bail!("mailbox capacity must be at least 1");
        }
        if let Some(secs) = self.get_timeout {
            if !secs.is_finite() || secs <= 0.0 {
                anyhow::bail!("get timeout must be a positive number of seconds, got {secs}");
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn default_wait(&self) -> Option<Duration> {
        self.get_timeout.and_then(wait_from_secs)
    }
}

/// Converts a caller-supplied wait in seconds. Non-positive or non-finite
/// values mean "no wait given".
pub fn wait_from_secs(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}
