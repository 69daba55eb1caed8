//! Server configuration.
//!
//! Every flag has a `KAIWA_*` environment fallback so the broker can be
//! configured entirely from the deployment environment.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::domain::{GateMode, OriginPolicy, SessionPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GateModeArg {
    /// Reject origins that match no allow rule
    Strict,
    /// Admit unknown origins with a warning (development)
    Permissive,
}

impl From<GateModeArg> for GateMode {
    fn from(arg: GateModeArg) -> Self {
        match arg {
            GateModeArg::Strict => GateMode::Strict,
            GateModeArg::Permissive => GateMode::Permissive,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "kaiwa-server")]
#[command(about = "Real-time room broker for per-prediction discussion", long_about = None)]
pub struct ServerArgs {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "KAIWA_HOST")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value_t = 8080, env = "KAIWA_PORT")]
    pub port: u16,

    /// Allowed origins, comma separated (`https://app.example.com`, `*.example.com`)
    #[arg(long, value_delimiter = ',', env = "KAIWA_ALLOWED_ORIGINS")]
    pub allowed_origins: Vec<String>,

    /// What to do with origins that match no rule
    #[arg(long, value_enum, default_value_t = GateModeArg::Strict, env = "KAIWA_GATE_MODE")]
    pub gate_mode: GateModeArg,

    /// Typing indicator auto-clear window in milliseconds
    #[arg(long, default_value_t = 3000, env = "KAIWA_TYPING_EXPIRY_MS")]
    pub typing_expiry_ms: u64,

    /// Upper bound of a single store call in milliseconds
    #[arg(long, default_value_t = 3000, env = "KAIWA_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: u64,

    /// Number of messages delivered on join
    #[arg(long, default_value_t = 100, env = "KAIWA_HISTORY_LIMIT")]
    pub history_limit: usize,

    /// Presence sweep interval in seconds
    #[arg(long, default_value_t = 300, env = "KAIWA_RECONCILE_INTERVAL_SECS")]
    pub reconcile_interval_secs: u64,

    /// Age after which a dead connection is evicted, in seconds
    #[arg(long, default_value_t = 300, env = "KAIWA_RECONCILE_GRACE_SECS")]
    pub reconcile_grace_secs: u64,

    /// Interval between stats log lines, in seconds
    #[arg(long, default_value_t = 60, env = "KAIWA_STATS_INTERVAL_SECS")]
    pub stats_interval_secs: u64,

    /// Allow one user id to hold several live connections
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "KAIWA_ALLOW_MULTIPLE_SESSIONS"
    )]
    pub allow_multiple_sessions: bool,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info", env = "KAIWA_LOG_LEVEL")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validated broker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub origin_policy: OriginPolicy,
    pub session_policy: SessionPolicy,
    pub typing_expiry: Duration,
    pub store_timeout: Duration,
    pub history_limit: usize,
    pub reconcile_interval: Duration,
    pub reconcile_grace: Duration,
    pub stats_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            origin_policy: OriginPolicy::default(),
            session_policy: SessionPolicy::default(),
            typing_expiry: Duration::from_millis(3000),
            store_timeout: Duration::from_millis(3000),
            history_limit: 100,
            reconcile_interval: Duration::from_secs(300),
            reconcile_grace: Duration::from_secs(300),
            stats_interval: Duration::from_secs(60),
        }
    }
}

impl TryFrom<&ServerArgs> for BrokerConfig {
    type Error = ConfigError;

    fn try_from(args: &ServerArgs) -> Result<Self, Self::Error> {
        let positive = |value: u64, name: &'static str| {
            if value == 0 {
                Err(ConfigError::Zero(name))
            } else {
                Ok(value)
            }
        };

        let typing_expiry_ms = positive(args.typing_expiry_ms, "typing expiry")?;
        let store_timeout_ms = positive(args.store_timeout_ms, "store timeout")?;
        let history_limit = positive(args.history_limit as u64, "history limit")? as usize;
        let reconcile_interval_secs =
            positive(args.reconcile_interval_secs, "reconcile interval")?;
        let stats_interval_secs = positive(args.stats_interval_secs, "stats interval")?;

        Ok(Self {
            host: args.host.clone(),
            port: args.port,
            origin_policy: OriginPolicy::from_entries(&args.allowed_origins, args.gate_mode.into()),
            session_policy: SessionPolicy {
                allow_multiple_sessions: args.allow_multiple_sessions,
            },
            typing_expiry: Duration::from_millis(typing_expiry_ms),
            store_timeout: Duration::from_millis(store_timeout_ms),
            history_limit,
            reconcile_interval: Duration::from_secs(reconcile_interval_secs),
            reconcile_grace: Duration::from_secs(args.reconcile_grace_secs),
            stats_interval: Duration::from_secs(stats_interval_secs),
        })
    }
}
