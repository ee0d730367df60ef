use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// notacloud file exchange server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "notacloud-server", version, about = "Encrypted file exchange server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "NOTACLOUD_PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "NOTACLOUD_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./notacloud.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "NOTACLOUD_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (SQLite database)
    #[arg(long, env = "NOTACLOUD_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// File exchange configuration (loaded from [exchange] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub exchange: Option<ExchangeConfig>,
}

/// Configuration for the file exchange store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Number of days an uploaded file stays retrievable (default: 7)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Interval in seconds between retention sweep runs (default: 3600 = 1 hour).
    /// Set to 0 to disable the sweep; expired files are still evicted lazily
    /// on access.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Maximum decoded upload size in megabytes per file (default: 500)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            sweep_interval_secs: 3600,
            max_upload_size_mb: 500,
        }
    }
}

fn default_retention_days() -> u32 {
    7
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_max_upload_size() -> u32 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            config: "./notacloud.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            exchange: Some(ExchangeConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (NOTACLOUD_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("NOTACLOUD_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# notacloud File Exchange Server Configuration
# Place this file at ./notacloud.toml or specify with --config <path>
# All settings can be overridden via environment variables (NOTACLOUD_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# ---- File Exchange ----
# [exchange]

# Number of days an uploaded file stays retrievable (default: 7)
# retention_days = 7

# Interval in seconds between retention sweep runs (default: 3600 = 1 hour)
# Set to 0 to disable the sweep; expired files are still evicted on access.
# sweep_interval_secs = 3600

# Maximum decoded upload size in megabytes per file (default: 500)
# max_upload_size_mb = 500
"#
    .to_string()
}
