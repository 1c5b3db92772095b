//! Edge configuration: environment variables with `clap` CLI overrides,
//! in the teacher's `Args::parse()` + env-var style.

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
#[command(name = "sentry-edge")]
#[command(about = "Edge telemetry node: tails Zeek logs, runs anomaly detection, escalates alerts")]
#[command(version)]
pub struct Args {
    /// HTTP port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Oracle center webhook URL to escalate alerts to
    #[arg(long)]
    pub oracle_url: Option<String>,

    /// Override the Zeek log directory (bypasses auto-discovery)
    #[arg(long)]
    pub log_dir: Option<String>,
}

/// Resolved edge configuration (§10 Configuration).
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub port: u16,
    pub oracle_url: String,
    pub log_dir_override: Option<String>,
    pub model_path: String,
    pub detector_max_training_samples: u64,
    pub detector_threshold: f64,
    pub correlator_cap: usize,
}

impl SentryConfig {
    /// Build configuration from environment variables, then apply any
    /// CLI overrides (`SentryConfig::from_env().with_args(&args)`).
    pub fn from_env() -> Self {
        Self {
            port: env_or_u64("SENTRY_PORT", 8420) as u16,
            oracle_url: env_or("ORACLE_WEBHOOK_URL", "http://localhost:8000/api/alerts"),
            log_dir_override: std::env::var("SENTRY_LOG_DIR").ok(),
            model_path: env_or("SENTRY_MODEL_PATH", "/var/lib/sentry/detector_model.json"),
            detector_max_training_samples: env_or_u64("SENTRY_DETECTOR_TRAINING_SAMPLES", 1000),
            detector_threshold: env_or_f64("SENTRY_DETECTOR_THRESHOLD", 0.95),
            correlator_cap: env_or_u64("SENTRY_CORRELATOR_CAP", 10_000) as usize,
        }
    }

    pub fn with_args(mut self, args: &Args) -> Self {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(url) = &args.oracle_url {
            self.oracle_url = url.clone();
        }
        if let Some(dir) = &args.log_dir {
            self.log_dir_override = Some(dir.clone());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_args_override_defaults() {
        let base = SentryConfig {
            port: 8420,
            oracle_url: "http://localhost:8000/api/alerts".to_string(),
            log_dir_override: None,
            model_path: "model.json".to_string(),
            detector_max_training_samples: 1000,
            detector_threshold: 0.95,
            correlator_cap: 10_000,
        };
        let args = Args {
            port: Some(9000),
            oracle_url: None,
            log_dir: Some("/tmp/zeek".to_string()),
        };
        let resolved = base.with_args(&args);
        assert_eq!(resolved.port, 9000);
        assert_eq!(resolved.log_dir_override.as_deref(), Some("/tmp/zeek"));
        assert_eq!(resolved.oracle_url, "http://localhost:8000/api/alerts");
    }
}
