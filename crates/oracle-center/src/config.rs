//! Center configuration: environment variables with `clap` CLI
//! overrides, mirroring `sentry-edge::config`'s pattern.

use clap::Parser;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_or_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Parser, Debug)]
#[command(name = "oracle-center")]
#[command(about = "Center analytics service: ingests, scores, and correlates alerts from edge nodes")]
#[command(version)]
pub struct Args {
    /// HTTP port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the sled database directory
    #[arg(long)]
    pub store_path: Option<String>,

    /// Base URL of an optional AI reasoning endpoint
    #[arg(long)]
    pub reasoning_url: Option<String>,
}

/// Resolved center configuration (§10 Configuration).
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub port: u16,
    pub store_path: String,
    pub dedupe_window_secs: u64,
    pub global_minute_limit: u32,
    pub threat_score_threshold: f64,
    pub reasoning_url: Option<String>,
}

impl OracleConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_or_u64("ORACLE_PORT", 8000) as u16,
            store_path: env_or("ORACLE_STORE_PATH", "/var/lib/oracle/alerts.db"),
            dedupe_window_secs: env_or_u64("ORACLE_DEDUPE_WINDOW_SECS", 60),
            global_minute_limit: env_or_u64("ORACLE_GLOBAL_MINUTE_LIMIT", 50) as u32,
            threat_score_threshold: env_or_f64("ORACLE_THREAT_SCORE_THRESHOLD", 0.95),
            reasoning_url: std::env::var("ORACLE_REASONING_URL").ok(),
        }
    }

    pub fn with_args(mut self, args: &Args) -> Self {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(path) = &args.store_path {
            self.store_path = path.clone();
        }
        if let Some(url) = &args.reasoning_url {
            self.reasoning_url = Some(url.clone());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_args_override_defaults() {
        let base = OracleConfig {
            port: 8000,
            store_path: "alerts.db".to_string(),
            dedupe_window_secs: 60,
            global_minute_limit: 50,
            threat_score_threshold: 0.95,
            reasoning_url: None,
        };
        let args = Args { port: Some(9100), store_path: None, reasoning_url: Some("http://reasoner".to_string()) };
        let resolved = base.with_args(&args);
        assert_eq!(resolved.port, 9100);
        assert_eq!(resolved.store_path, "alerts.db");
        assert_eq!(resolved.reasoning_url.as_deref(), Some("http://reasoner"));
    }
}
